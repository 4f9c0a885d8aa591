//! Immutable, versioned view of a line-oriented document.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

/// Inclusive, 1-indexed line interval in current coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProtectedRange {
    pub start: usize,
    pub end: usize,
}

impl ProtectedRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }

    pub fn contains(&self, line: usize) -> bool {
        self.start <= line && line <= self.end
    }

    /// Move the range after `n` lines were inserted before current line `at`.
    fn shift_for_insert(self, at: usize, n: usize) -> Self {
        if self.start >= at {
            Self::new(self.start + n, self.end + n)
        } else if self.end >= at {
            Self::new(self.start, self.end + n)
        } else {
            self
        }
    }

    /// Move the range after current line `at` was removed. Returns `None` when
    /// the range no longer covers any line.
    fn shift_for_delete(self, at: usize) -> Option<Self> {
        if self.start > at {
            Some(Self::new(self.start - 1, self.end - 1))
        } else if self.end >= at {
            if self.start == self.end {
                None
            } else {
                Some(Self::new(self.start, self.end - 1))
            }
        } else {
            Some(self)
        }
    }
}

/// A document at one version.
///
/// A snapshot is never mutated; applying an edit yields a new snapshot whose
/// version is one higher. Version 1 is the content read at session start.
///
/// Every line keeps the terminator it was read with, so files with mixed
/// endings render back byte for byte. Inserted lines take the dominant one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    path: Utf8PathBuf,
    lines: Vec<String>,
    /// Terminator after each line; the last is only written with
    /// `trailing_newline`.
    endings: Vec<LineEnding>,
    version: u64,
    protected: Vec<ProtectedRange>,
    line_ending: LineEnding,
    trailing_newline: bool,
}

impl Snapshot {
    pub const INITIAL_VERSION: u64 = 1;

    /// Split `text` into lines, remembering each line's ending and whether
    /// the text ended with a newline.
    pub fn from_text(path: impl Into<Utf8PathBuf>, text: &str) -> Self {
        let mut lines = Vec::new();
        let mut endings = Vec::new();
        let mut rest = text;
        while let Some(pos) = rest.find('\n') {
            let (line, ending) = match rest[..pos].strip_suffix('\r') {
                Some(line) => (line, LineEnding::CrLf),
                None => (&rest[..pos], LineEnding::Lf),
            };
            lines.push(line.to_string());
            endings.push(ending);
            rest = &rest[pos + 1..];
        }

        let crlf = endings.iter().filter(|e| **e == LineEnding::CrLf).count();
        let line_ending = if crlf * 2 > endings.len() {
            LineEnding::CrLf
        } else {
            LineEnding::Lf
        };

        // An empty file gains a newline once something is written to it.
        let trailing_newline = rest.is_empty();
        if !trailing_newline {
            lines.push(rest.to_string());
            endings.push(line_ending);
        }

        Self {
            path: path.into(),
            lines,
            endings,
            version: Self::INITIAL_VERSION,
            protected: Vec::new(),
            line_ending,
            trailing_newline,
        }
    }

    pub fn with_protected(mut self, ranges: impl IntoIterator<Item = ProtectedRange>) -> Self {
        self.protected = ranges.into_iter().collect();
        self.protected.sort();
        self
    }

    /// Reassemble the document with the line endings it was read with.
    pub fn render(&self) -> String {
        let last = self.lines.len().saturating_sub(1);
        let mut out = String::new();
        for (idx, (line, ending)) in self.lines.iter().zip(&self.endings).enumerate() {
            out.push_str(line);
            if idx < last || self.trailing_newline {
                out.push_str(ending.as_str());
            }
        }
        out
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The ending most lines use, given to inserted lines.
    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    /// Terminator stored for 1-indexed `line`.
    pub fn line_ending_at(&self, line: usize) -> Option<LineEnding> {
        line.checked_sub(1)
            .and_then(|idx| self.endings.get(idx))
            .copied()
    }

    pub fn trailing_newline(&self) -> bool {
        self.trailing_newline
    }

    /// Text of 1-indexed `line`.
    pub fn line(&self, line: usize) -> Option<&str> {
        line.checked_sub(1)
            .and_then(|idx| self.lines.get(idx))
            .map(String::as_str)
    }

    pub fn protected_ranges(&self) -> &[ProtectedRange] {
        &self.protected
    }

    pub fn is_protected(&self, line: usize) -> bool {
        self.protected.iter().any(|r| r.contains(line))
    }

    /// Up to `radius` lines either side of `line`, with their numbers.
    pub fn window(&self, line: usize, radius: usize) -> Vec<(usize, &str)> {
        if self.lines.is_empty() {
            return Vec::new();
        }
        let start = line.saturating_sub(radius).max(1);
        let end = line.saturating_add(radius).min(self.lines.len());
        (start..=end)
            .filter_map(|n| self.line(n).map(|text| (n, text)))
            .collect()
    }

    pub(crate) fn with_inserted(&self, at: usize, content: &[String]) -> Self {
        let idx = at.saturating_sub(1).min(self.lines.len());
        let mut lines = self.lines.clone();
        lines.splice(idx..idx, content.iter().cloned());
        let mut endings = self.endings.clone();
        endings.splice(idx..idx, std::iter::repeat_n(self.line_ending, content.len()));
        let protected = self
            .protected
            .iter()
            .map(|r| r.shift_for_insert(at, content.len()))
            .collect();
        self.successor(lines, endings, protected)
    }

    pub(crate) fn with_deleted(&self, at: usize) -> Self {
        let mut lines = self.lines.clone();
        let mut endings = self.endings.clone();
        if at >= 1 && at <= lines.len() {
            lines.remove(at - 1);
            endings.remove(at - 1);
        }
        let protected = self
            .protected
            .iter()
            .filter_map(|r| r.shift_for_delete(at))
            .collect();
        self.successor(lines, endings, protected)
    }

    pub(crate) fn with_replaced(&self, at: usize, text: &str) -> Self {
        let mut lines = self.lines.clone();
        if let Some(slot) = at.checked_sub(1).and_then(|idx| lines.get_mut(idx)) {
            *slot = text.to_string();
        }
        self.successor(lines, self.endings.clone(), self.protected.clone())
    }

    fn successor(
        &self,
        lines: Vec<String>,
        endings: Vec<LineEnding>,
        protected: Vec<ProtectedRange>,
    ) -> Self {
        Self {
            path: self.path.clone(),
            lines,
            endings,
            version: self.version + 1,
            protected,
            line_ending: self.line_ending,
            trailing_newline: self.trailing_newline,
        }
    }
}
