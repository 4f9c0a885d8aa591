//! Protected regions for MDX documents.
//!
//! MDX mixes markdown with JSX. Lines that belong to imports, exports,
//! components, or `{...}` expressions must not be edited by line rules.

use camino::Utf8Path;
use docfix_edit::ProtectedRange;

pub fn is_mdx(path: &Utf8Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mdx"))
}

/// Leading component name of a line such as `  <Tabs items={...}>`.
fn component_name(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix('<')?;
    let first = rest.chars().next()?;
    if !first.is_ascii_uppercase() {
        return None;
    }
    let end = rest
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

fn closes(line: &str, name: &str) -> bool {
    line.contains(&format!("</{name}>"))
}

pub fn mdx_protected_ranges(lines: &[String]) -> Vec<ProtectedRange> {
    let mut ranges = Vec::new();
    let mut open: Option<(usize, &str)> = None;

    for (idx, line) in lines.iter().enumerate() {
        let n = idx + 1;
        let trimmed = line.trim();

        if let Some((start, name)) = open {
            if trimmed.starts_with(&format!("</{name}>")) {
                ranges.push(ProtectedRange::new(start, n));
                open = None;
            }
            continue;
        }

        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with("import ") || trimmed.starts_with("export ") {
            ranges.push(ProtectedRange::new(n, n));
            continue;
        }
        if let Some(name) = component_name(line) {
            if trimmed.ends_with("/>") || closes(line, name) {
                ranges.push(ProtectedRange::new(n, n));
            } else {
                open = Some((n, name));
            }
            continue;
        }
        if trimmed.contains('{') {
            ranges.push(ProtectedRange::new(n, n));
        }
    }

    // An unclosed component protects the rest of the document.
    if let Some((start, _)) = open
        && !lines.is_empty()
    {
        ranges.push(ProtectedRange::new(start, lines.len()));
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    fn protected(ranges: &[ProtectedRange], line: usize) -> bool {
        ranges.iter().any(|r| r.contains(line))
    }

    #[test]
    fn recognises_mdx_extension() {
        assert!(is_mdx(Utf8Path::new("docs/intro.mdx")));
        assert!(is_mdx(Utf8Path::new("A.MDX")));
        assert!(!is_mdx(Utf8Path::new("README.md")));
    }

    #[test]
    fn imports_components_and_exports() {
        let doc = lines(
            "# Title\n\nimport { Button } from './Button'\n\nProse.\n\n<Button onClick={() => go()}>\n  Click me\n</Button>\n\nMore prose.\n\nexport default Button\n",
        );
        let ranges = mdx_protected_ranges(&doc);
        assert!(protected(&ranges, 3));
        assert!(!protected(&ranges, 5));
        for n in 7..=9 {
            assert!(protected(&ranges, n), "line {n}");
        }
        assert!(!protected(&ranges, 11));
        assert!(protected(&ranges, 13));
    }

    #[test]
    fn self_closing_and_single_line_components() {
        let doc = lines("<Note kind=\"tip\" />\ntext\n<Badge>new</Badge>\ntext");
        let ranges = mdx_protected_ranges(&doc);
        assert!(protected(&ranges, 1));
        assert!(!protected(&ranges, 2));
        assert!(protected(&ranges, 3));
        assert!(!protected(&ranges, 4));
    }

    #[test]
    fn nested_components_protect_the_outer_block() {
        let doc = lines("<Outer>\n  <Inner x=\"1\">\n    <Deep />\n  </Inner>\n</Outer>\nafter");
        let ranges = mdx_protected_ranges(&doc);
        for n in 1..=5 {
            assert!(protected(&ranges, n), "line {n}");
        }
        assert!(!protected(&ranges, 6));
    }

    #[test]
    fn expressions_and_html_tags() {
        let doc = lines("Value is {count}.\n<div>plain html</div>\n{/* comment */}");
        let ranges = mdx_protected_ranges(&doc);
        assert!(protected(&ranges, 1));
        assert!(!protected(&ranges, 2));
        assert!(protected(&ranges, 3));
    }

    #[test]
    fn unclosed_component_runs_to_end() {
        let doc = lines("intro\n<Tabs>\n  one\n  two");
        let ranges = mdx_protected_ranges(&doc);
        assert_eq!(ranges, vec![ProtectedRange::new(2, 4)]);
    }
}
