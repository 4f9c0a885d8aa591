//! The closed set of rule sources.
//!
//! A source inspects one snapshot and returns issue drafts. Sources are pure
//! functions of the snapshot (and, for external programs, of the program's
//! behavior); they never see each other's output.

use crate::diff::diff_to_drafts;
use docfix_edit::Snapshot;
use docfix_types::issue::{Issue, IssueDraft, IssueKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Environment variable carrying the document path to external programs.
pub const PATH_ENV: &str = "DOCFIX_PATH";

const CHILD_POLL: Duration = Duration::from_millis(20);

/// Bounds on how long an external program may run. In-process sources
/// ignore them.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunLimits<'a> {
    /// Kill the program once it has run this long.
    pub timeout: Option<Duration>,
    /// Kill the program as soon as this flag is set.
    pub stop: Option<&'a AtomicBool>,
}

impl RunLimits<'_> {
    fn stopped(&self) -> bool {
        self.stop.is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("`{program}` produced unusable output: {message}")]
    Output { program: String, message: String },

    #[error("`{program}` did not finish within {timeout:?} and was killed")]
    Timeout { program: String, timeout: Duration },

    #[error("`{program}` was killed because the run was cancelled")]
    Cancelled { program: String },

    #[error("draft for line {line} is invalid: {message}")]
    InvalidDraft { line: usize, message: String },
}

/// A configured source: a unique name plus its kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub name: String,

    #[serde(flatten)]
    pub source: RuleSource,
}

impl SourceSpec {
    pub fn new(name: impl Into<String>, source: RuleSource) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }

    /// Run the source and stamp its drafts with this source's name and the
    /// snapshot version.
    pub fn detect(&self, snapshot: &Snapshot) -> Result<Vec<Issue>, DetectorError> {
        self.detect_within(snapshot, RunLimits::default())
    }

    /// [`SourceSpec::detect`] with external programs bounded by `limits`.
    pub fn detect_within(
        &self,
        snapshot: &Snapshot,
        limits: RunLimits<'_>,
    ) -> Result<Vec<Issue>, DetectorError> {
        let drafts = self.source.detect_within(snapshot, limits)?;
        Ok(stamp(&self.name, snapshot, drafts))
    }
}

pub(crate) fn stamp(name: &str, snapshot: &Snapshot, drafts: Vec<IssueDraft>) -> Vec<Issue> {
    drafts
        .into_iter()
        .map(|d| d.into_issue(name, snapshot.version()))
        .collect()
}

fn default_max_consecutive() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleSource {
    /// Strip trailing spaces and tabs.
    TrailingWhitespace,

    /// Collapse runs of blank lines longer than `max_consecutive`.
    BlankLines {
        #[serde(default = "default_max_consecutive")]
        max_consecutive: usize,
    },

    /// Whole-word term substitutions, e.g. `utilize` -> `use`.
    Terms {
        terms: BTreeMap<String, String>,
        #[serde(default)]
        case_sensitive: bool,
    },

    /// External linter: reads the document on stdin, prints a JSON array of
    /// issue drafts.
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },

    /// External rewriter: reads the document on stdin, prints the corrected
    /// document. The difference becomes line issues.
    Rewrite {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },

    /// Fixed drafts.
    Static {
        #[serde(default)]
        issues: Vec<IssueDraft>,
    },
}

impl RuleSource {
    /// Kind name as used in configuration and the source registry.
    pub fn kind(&self) -> &'static str {
        match self {
            RuleSource::TrailingWhitespace => "trailing_whitespace",
            RuleSource::BlankLines { .. } => "blank_lines",
            RuleSource::Terms { .. } => "terms",
            RuleSource::Command { .. } => "command",
            RuleSource::Rewrite { .. } => "rewrite",
            RuleSource::Static { .. } => "static",
        }
    }

    /// Sources whose output depends on something other than the document text.
    pub fn is_external(&self) -> bool {
        matches!(self, RuleSource::Command { .. } | RuleSource::Rewrite { .. })
    }

    pub fn detect(&self, snapshot: &Snapshot) -> Result<Vec<IssueDraft>, DetectorError> {
        self.detect_within(snapshot, RunLimits::default())
    }

    pub fn detect_within(
        &self,
        snapshot: &Snapshot,
        limits: RunLimits<'_>,
    ) -> Result<Vec<IssueDraft>, DetectorError> {
        let drafts = match self {
            RuleSource::TrailingWhitespace => trailing_whitespace(snapshot),
            RuleSource::BlankLines { max_consecutive } => blank_lines(snapshot, *max_consecutive),
            RuleSource::Terms {
                terms,
                case_sensitive,
            } => substitute_terms(snapshot, terms, *case_sensitive),
            RuleSource::Command { program, args } => {
                let stdout = run_program(snapshot, program, args, limits)?;
                serde_json::from_str::<Vec<IssueDraft>>(&stdout).map_err(|e| {
                    DetectorError::Output {
                        program: program.clone(),
                        message: e.to_string(),
                    }
                })?
            }
            RuleSource::Rewrite { program, args } => {
                let stdout = run_program(snapshot, program, args, limits)?;
                let rewritten: Vec<String> = Snapshot::from_text(snapshot.path(), &stdout)
                    .lines()
                    .to_vec();
                diff_to_drafts(snapshot.lines(), &rewritten)
            }
            RuleSource::Static { issues } => issues.clone(),
        };

        for draft in &drafts {
            validate_draft(snapshot, draft)?;
        }
        debug!(kind = self.kind(), drafts = drafts.len(), "source finished");
        Ok(drafts)
    }
}

fn validate_draft(snapshot: &Snapshot, draft: &IssueDraft) -> Result<(), DetectorError> {
    let invalid = |message: &str| DetectorError::InvalidDraft {
        line: draft.line,
        message: message.to_string(),
    };

    let max = match draft.kind {
        IssueKind::Insert { .. } => snapshot.len() + 1,
        IssueKind::Delete | IssueKind::Replace { .. } => snapshot.len(),
    };
    if draft.line == 0 || draft.line > max {
        return Err(invalid(&format!("line is outside 1..={max}")));
    }
    if let Some(c) = draft.confidence
        && !(0.0..=1.0).contains(&c)
    {
        return Err(invalid("confidence must be within [0, 1]"));
    }

    let breaks = |s: &str| s.contains('\n') || s.contains('\r');
    match &draft.kind {
        IssueKind::Insert { content } if content.is_empty() => Err(invalid("insert has no content")),
        IssueKind::Insert { content } if content.iter().any(|l| breaks(l)) => {
            Err(invalid("inserted lines must not contain line breaks"))
        }
        IssueKind::Replace { new_content } if breaks(new_content) => {
            Err(invalid("replacement must be a single line"))
        }
        _ => Ok(()),
    }
}

fn run_program(
    snapshot: &Snapshot,
    program: &str,
    args: &[String],
    limits: RunLimits<'_>,
) -> Result<String, DetectorError> {
    let spawn_err = |source| DetectorError::Spawn {
        program: program.to_string(),
        source,
    };
    let mut child = Command::new(program)
        .args(args)
        .env(PATH_ENV, snapshot.path().as_str())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(spawn_err)?;

    // Pipes are serviced on their own threads so a child that writes before
    // it has read everything cannot deadlock us. They are detached rather
    // than joined when the child is killed.
    if let Some(mut stdin) = child.stdin.take() {
        let input = snapshot.render();
        std::thread::spawn(move || {
            // A child that exits without reading is reported via its status.
            let _ = stdin.write_all(input.as_bytes());
        });
    }
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let status = wait_within(&mut child, program, limits)?;
    let stdout = collect(stdout).map_err(spawn_err)?;
    let stderr = collect(stderr).map_err(spawn_err)?;

    if !status.success() {
        return Err(DetectorError::Exit {
            program: program.to_string(),
            status: status.to_string(),
            stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
        });
    }

    String::from_utf8(stdout).map_err(|e| DetectorError::Output {
        program: program.to_string(),
        message: e.to_string(),
    })
}

fn drain(mut pipe: impl Read + Send + 'static) -> JoinHandle<io::Result<Vec<u8>>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn collect(reader: Option<JoinHandle<io::Result<Vec<u8>>>>) -> io::Result<Vec<u8>> {
    match reader {
        Some(handle) => handle
            .join()
            .unwrap_or_else(|_| Err(io::Error::other("pipe reader panicked"))),
        None => Ok(Vec::new()),
    }
}

/// Wait for `child`, killing it when `limits` run out.
fn wait_within(
    child: &mut Child,
    program: &str,
    limits: RunLimits<'_>,
) -> Result<ExitStatus, DetectorError> {
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait().map_err(|source| DetectorError::Spawn {
            program: program.to_string(),
            source,
        })? {
            return Ok(status);
        }

        let error = if limits.stopped() {
            DetectorError::Cancelled {
                program: program.to_string(),
            }
        } else if let Some(timeout) = limits.timeout.filter(|t| started.elapsed() >= *t) {
            DetectorError::Timeout {
                program: program.to_string(),
                timeout,
            }
        } else {
            std::thread::sleep(CHILD_POLL);
            continue;
        };

        warn!(program, error = %error, "killing external source");
        let _ = child.kill();
        let _ = child.wait();
        return Err(error);
    }
}

fn trailing_whitespace(snapshot: &Snapshot) -> Vec<IssueDraft> {
    snapshot
        .lines()
        .iter()
        .enumerate()
        .filter_map(|(idx, line)| {
            let trimmed = line.trim_end_matches([' ', '\t']);
            (trimmed.len() != line.len()).then(|| {
                IssueDraft::replace(idx + 1, trimmed)
                    .with_message("trailing whitespace")
                    .with_confidence(1.0)
            })
        })
        .collect()
}

fn blank_lines(snapshot: &Snapshot, max_consecutive: usize) -> Vec<IssueDraft> {
    let mut drafts = Vec::new();
    let mut run = 0usize;
    for (idx, line) in snapshot.lines().iter().enumerate() {
        if line.trim().is_empty() {
            run += 1;
            if run > max_consecutive {
                drafts.push(
                    IssueDraft::delete(idx + 1)
                        .with_message(format!(
                            "more than {max_consecutive} consecutive blank line(s)"
                        ))
                        .with_confidence(1.0),
                );
            }
        } else {
            run = 0;
        }
    }
    drafts
}

/// Word lists cannot see context, so a term hit is never certain.
const TERM_CONFIDENCE: f64 = 0.9;

fn substitute_terms(
    snapshot: &Snapshot,
    terms: &BTreeMap<String, String>,
    case_sensitive: bool,
) -> Vec<IssueDraft> {
    let mut drafts = Vec::new();
    for (idx, line) in snapshot.lines().iter().enumerate() {
        let mut current = line.clone();
        let mut messages = Vec::new();
        for (from, to) in terms {
            if from.is_empty() {
                continue;
            }
            if let Some(next) = replace_words(&current, from, to, case_sensitive) {
                messages.push(format!("use '{to}' instead of '{from}'"));
                current = next;
            }
        }
        if current != *line {
            let mut draft = IssueDraft::replace(idx + 1, current).with_confidence(TERM_CONFIDENCE);
            draft.messages = messages;
            drafts.push(draft);
        }
    }
    drafts
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Replace whole-word occurrences of `from`. Returns `None` when nothing matched.
fn replace_words(line: &str, from: &str, to: &str, case_sensitive: bool) -> Option<String> {
    let mut out = String::with_capacity(line.len());
    let mut matched = false;
    let mut pos = 0usize;

    while pos < line.len() {
        let candidate = line.get(pos..pos + from.len().min(line.len() - pos));
        let hit = candidate.filter(|c| {
            c.len() == from.len()
                && if case_sensitive {
                    *c == from
                } else {
                    c.eq_ignore_ascii_case(from)
                }
        });

        if let Some(found) = hit {
            let before_ok = line[..pos].chars().next_back().is_none_or(|c| !is_word_char(c));
            let after_ok = line[pos + found.len()..]
                .chars()
                .next()
                .is_none_or(|c| !is_word_char(c));
            if before_ok && after_ok {
                out.push_str(&match_case(found, to));
                pos += found.len();
                matched = true;
                continue;
            }
        }

        let Some(c) = line[pos..].chars().next() else {
            break;
        };
        out.push(c);
        pos += c.len_utf8();
    }

    matched.then_some(out)
}

/// Carry a leading capital from the matched text over to the replacement.
fn match_case(found: &str, replacement: &str) -> String {
    let found_upper = found.chars().next().is_some_and(char::is_uppercase);
    let mut chars = replacement.chars();
    match chars.next() {
        Some(first) if found_upper && first.is_lowercase() => {
            first.to_uppercase().chain(chars).collect()
        }
        _ => replacement.to_string(),
    }
}
