use serde::{Deserialize, Serialize};

/// The line operation an issue proposes.
///
/// Anchors are 1-indexed and relative to the snapshot version the issue was
/// computed against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IssueKind {
    /// Insert `content` before the anchor line. Anchoring at `len + 1` appends.
    Insert { content: Vec<String> },
    /// Remove the anchor line.
    Delete,
    /// Replace the text of the anchor line.
    Replace { new_content: String },
}

impl IssueKind {
    pub fn issue_type(&self) -> IssueType {
        match self {
            IssueKind::Insert { .. } => IssueType::Insert,
            IssueKind::Delete => IssueType::Delete,
            IssueKind::Replace { .. } => IssueType::Replace,
        }
    }

    /// Net change in document line count when this operation is applied.
    pub fn line_delta(&self) -> isize {
        match self {
            IssueKind::Insert { content } => content.len() as isize,
            IssueKind::Delete => -1,
            IssueKind::Replace { .. } => 0,
        }
    }

    /// Proposed text, as shown to reviewers and recorded in the decision log.
    pub fn proposed_text(&self) -> Option<String> {
        match self {
            IssueKind::Insert { content } => Some(content.join("\n")),
            IssueKind::Delete => None,
            IssueKind::Replace { new_content } => Some(new_content.clone()),
        }
    }
}

/// Flat issue discriminant used in logs and statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    Insert,
    Delete,
    Replace,
}

impl IssueType {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueType::Insert => "insert",
            IssueType::Delete => "delete",
            IssueType::Replace => "replace",
        }
    }
}

/// A typed, line-anchored proposed edit produced by a rule source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Name of the rule source that produced this issue.
    pub source_id: String,

    /// 1-indexed line in the coordinate space of `snapshot_version`.
    pub anchor_line: usize,

    /// Human-readable rationale.
    #[serde(default)]
    pub messages: Vec<String>,

    pub snapshot_version: u64,

    /// Detector confidence in `[0, 1]`, when the detector reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    #[serde(flatten)]
    pub kind: IssueKind,
}

impl Issue {
    pub fn issue_type(&self) -> IssueType {
        self.kind.issue_type()
    }
}

/// Detector output before the engine stamps source id and snapshot version.
///
/// This is also the wire shape external `command` detectors print:
/// `{"type": "replace", "line": 3, "new_content": "...", "messages": ["..."]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueDraft {
    pub line: usize,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    #[serde(flatten)]
    pub kind: IssueKind,
}

impl IssueDraft {
    pub fn insert(line: usize, content: Vec<String>) -> Self {
        Self {
            line,
            messages: vec![],
            confidence: None,
            kind: IssueKind::Insert { content },
        }
    }

    pub fn delete(line: usize) -> Self {
        Self {
            line,
            messages: vec![],
            confidence: None,
            kind: IssueKind::Delete,
        }
    }

    pub fn replace(line: usize, new_content: impl Into<String>) -> Self {
        Self {
            line,
            messages: vec![],
            confidence: None,
            kind: IssueKind::Replace {
                new_content: new_content.into(),
            },
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.messages.push(message.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Bind the draft to the source and snapshot version it was computed for.
    pub fn into_issue(self, source_id: &str, snapshot_version: u64) -> Issue {
        Issue {
            source_id: source_id.to_string(),
            anchor_line: self.line,
            messages: self.messages,
            snapshot_version,
            confidence: self.confidence,
            kind: self.kind,
        }
    }
}

impl From<&Issue> for IssueDraft {
    fn from(issue: &Issue) -> Self {
        Self {
            line: issue.anchor_line,
            messages: issue.messages.clone(),
            confidence: issue.confidence,
            kind: issue.kind.clone(),
        }
    }
}
