//! Static table describing every rule source kind.

use docfix_types::issue::IssueType;

#[derive(Debug, Clone)]
pub struct SourceInfo {
    /// Kind name as written in `docfix.toml` (e.g. `trailing_whitespace`).
    pub kind: &'static str,
    pub title: &'static str,
    /// Issue types the source can emit.
    pub produces: &'static [IssueType],
    pub description: &'static str,
    /// Example `[[sources]]` entry.
    pub example: &'static str,
}

pub static SOURCE_REGISTRY: &[SourceInfo] = &[
    SourceInfo {
        kind: "trailing_whitespace",
        title: "Trailing Whitespace",
        produces: &[IssueType::Replace],
        description: r#"Flags lines that end in spaces or tabs and proposes the same line with the
trailing whitespace removed. Markdown hard line breaks (two trailing spaces)
are flagged too; reject those issues to keep them."#,
        example: r#"[[sources]]
name = "whitespace"
kind = "trailing_whitespace""#,
    },
    SourceInfo {
        kind: "blank_lines",
        title: "Consecutive Blank Lines",
        produces: &[IssueType::Delete],
        description: r#"Flags blank lines beyond `max_consecutive` in a row (default 1) and proposes
deleting them. Lines containing only whitespace count as blank."#,
        example: r#"[[sources]]
name = "blanks"
kind = "blank_lines"
max_consecutive = 1"#,
    },
    SourceInfo {
        kind: "terms",
        title: "Term Substitutions",
        produces: &[IssueType::Replace],
        description: r#"Replaces whole-word occurrences of configured terms, one issue per line.
Matching ignores ASCII case unless `case_sensitive = true`; a capitalized
match keeps its capital in the replacement. Issues carry confidence 0.9, so
`--approval threshold --threshold 0.95` leaves them for a human."#,
        example: r#"[[sources]]
name = "style"
kind = "terms"
terms = { utilize = "use", leverage = "use" }"#,
    },
    SourceInfo {
        kind: "command",
        title: "External Linter",
        produces: &[IssueType::Insert, IssueType::Delete, IssueType::Replace],
        description: r#"Runs a program with the document on stdin and the document path in
DOCFIX_PATH. The program prints a JSON array of issue drafts, e.g.

    [{"type": "replace", "line": 3, "new_content": "...", "messages": ["..."]}]

A non-zero exit status or unparsable output marks the source as failed for
that document; other sources still run."#,
        example: r#"[[sources]]
name = "vale"
kind = "command"
program = "./scripts/vale-to-docfix.sh""#,
    },
    SourceInfo {
        kind: "rewrite",
        title: "External Rewriter",
        produces: &[IssueType::Insert, IssueType::Delete, IssueType::Replace],
        description: r#"Runs a program with the document on stdin and takes its stdout as the
corrected document. Differences become line issues: changed lines become
replacements, removed lines deletions, added lines insertions."#,
        example: r#"[[sources]]
name = "house-rules"
kind = "rewrite"
program = "python3"
args = ["rules/apply.py"]"#,
    },
    SourceInfo {
        kind: "static",
        title: "Static Issues",
        produces: &[IssueType::Insert, IssueType::Delete, IssueType::Replace],
        description: r#"Emits a fixed list of issue drafts for every document. Useful for replaying
reviewed edits and for testing approval setups."#,
        example: r#"[[sources]]
name = "banner"
kind = "static"
issues = [{ type = "insert", line = 1, content = ["<!-- generated -->"] }]"#,
    },
];

/// Look up a source kind, accepting `-` for `_` and any case.
pub fn lookup_source(query: &str) -> Option<&'static SourceInfo> {
    let normalized = query.trim().to_lowercase().replace('-', "_");
    SOURCE_REGISTRY.iter().find(|info| info.kind == normalized)
}

pub fn list_source_kinds() -> Vec<&'static str> {
    SOURCE_REGISTRY.iter().map(|info| info.kind).collect()
}
