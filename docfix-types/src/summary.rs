use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Session lifecycle.
///
/// `Detecting → Merging → Applying → Finalizing → Done`; `Aborted` is reachable
/// from every state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Detecting,
    Merging,
    Applying,
    Finalizing,
    Done,
    Aborted,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Done | SessionState::Aborted)
    }
}

/// Category of a condition that ended a session early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FatalKind {
    /// Another session already holds the file.
    LockContention,
    ReadFailure,
    /// The atomic write of the document failed.
    PersistenceFailure,
    /// A decision could not be appended to the log.
    DecisionLogFailure,
    /// The approval gate itself failed (not a rejection).
    ApprovalFailure,
    /// An approved edit could not be applied to the in-memory document.
    InvalidEdit,
    Cancelled,
}

impl FatalKind {
    /// Conditions a caller may simply retry later.
    pub fn is_retryable(self) -> bool {
        matches!(self, FatalKind::LockContention)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FatalCause {
    pub kind: FatalKind,
    pub message: String,
}

/// A rule source that failed during detection and contributed no issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorFailure {
    pub source_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub schema: String,
    pub session_id: String,
    pub file_path: String,
    pub dry_run: bool,

    /// Last state reached: `done` or `aborted`.
    pub state: SessionState,

    pub issues_seen: u64,
    pub approved: u64,
    /// Gate rejections, timeouts, and double deferrals.
    pub rejected: u64,
    pub skipped_stale: u64,
    pub skipped_protected: u64,

    /// Subset of `rejected` caused by approval timeouts.
    #[serde(default)]
    pub timed_out: u64,

    /// Issues deferred at least once.
    #[serde(default)]
    pub deferred: u64,

    /// Issues never offered because the session aborted first.
    #[serde(default)]
    pub unprocessed: u64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub detector_failures: Vec<DetectorFailure>,

    /// True when at least one detector failed.
    #[serde(default)]
    pub partial: bool,

    #[serde(default)]
    pub aborted: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fatal: Option<FatalCause>,

    /// Snapshot version last written to disk, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committed_version: Option<u64>,

    pub lines_before: u64,
    pub lines_after: u64,

    pub started_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl SessionSummary {
    pub fn new(session_id: String, file_path: String, dry_run: bool) -> Self {
        Self {
            schema: crate::schema::DOCFIX_SESSION_V1.to_string(),
            session_id,
            file_path,
            dry_run,
            state: SessionState::Detecting,
            issues_seen: 0,
            approved: 0,
            rejected: 0,
            skipped_stale: 0,
            skipped_protected: 0,
            timed_out: 0,
            deferred: 0,
            unprocessed: 0,
            detector_failures: vec![],
            partial: false,
            aborted: false,
            fatal: None,
            committed_version: None,
            lines_before: 0,
            lines_after: 0,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Number of decisions that should exist in the log for this session.
    pub fn decisions(&self) -> u64 {
        self.approved + self.rejected + self.skipped_stale + self.skipped_protected
    }
}

/// Totals across every session in one invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunTotals {
    pub documents: u64,
    pub issues_seen: u64,
    pub approved: u64,
    pub rejected: u64,
    pub skipped: u64,
    pub aborted: u64,
    pub partial: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub schema: String,
    pub tool: ToolInfo,
    pub dry_run: bool,

    #[serde(default)]
    pub sessions: Vec<SessionSummary>,

    pub totals: RunTotals,
}

impl RunReport {
    pub fn new(tool: ToolInfo, dry_run: bool) -> Self {
        Self {
            schema: crate::schema::DOCFIX_RUN_V1.to_string(),
            tool,
            dry_run,
            sessions: vec![],
            totals: RunTotals::default(),
        }
    }

    pub fn push(&mut self, summary: SessionSummary) {
        self.totals.documents += 1;
        self.totals.issues_seen += summary.issues_seen;
        self.totals.approved += summary.approved;
        self.totals.rejected += summary.rejected;
        self.totals.skipped += summary.skipped_stale + summary.skipped_protected;
        if summary.aborted {
            self.totals.aborted += 1;
        }
        if summary.partial {
            self.totals.partial += 1;
        }
        self.sessions.push(summary);
    }
}
