use crate::decision::{Decision, SkipReason};
use crate::issue::IssueType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a record belongs to a committing run or a dry-run preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordMode {
    #[default]
    Commit,
    Preview,
}

/// One line of the decision log.
///
/// Self-contained: a consumer can reconstruct the edit without reading any
/// other record or the document history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub schema: String,
    pub session_id: String,

    #[serde(default)]
    pub mode: RecordMode,

    pub file_path: String,
    pub source_id: String,
    pub issue_type: IssueType,

    /// Anchor as produced by the detector (original coordinates).
    pub anchor_line: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_line: Option<usize>,

    /// Text of the targeted line before the edit (absent for insertions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_content: Option<String>,

    /// Text the edit would write (absent for deletions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposed_content: Option<String>,

    #[serde(default)]
    pub messages: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    pub approved: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<SkipReason>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,

    #[serde(default)]
    pub deferred: bool,

    pub latency_ms: u64,
    pub decided_at: DateTime<Utc>,
}

impl DecisionRecord {
    pub fn from_decision(
        session_id: &str,
        mode: RecordMode,
        file_path: &str,
        decision: &Decision,
        original_content: Option<String>,
    ) -> Self {
        let issue = &decision.issue;
        let original_content = match issue.issue_type() {
            IssueType::Insert => None,
            IssueType::Delete | IssueType::Replace => original_content,
        };

        Self {
            schema: crate::schema::DOCFIX_DECISION_V1.to_string(),
            session_id: session_id.to_string(),
            mode,
            file_path: file_path.to_string(),
            source_id: issue.source_id.clone(),
            issue_type: issue.issue_type(),
            anchor_line: issue.anchor_line,
            resolved_line: decision.resolved_line,
            original_content,
            proposed_content: issue.kind.proposed_text(),
            messages: issue.messages.clone(),
            confidence: issue.confidence,
            approved: decision.approved,
            reason: decision.reason,
            explanation: decision.explanation.clone(),
            deferred: decision.deferred,
            latency_ms: decision.latency_ms,
            decided_at: decision.decided_at,
        }
    }
}
