use crate::issue::Issue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why an issue was not applied.
///
/// Serialized as a stable snake_case token so downstream consumers can group
/// outcomes without parsing prose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The anchor no longer resolves after upstream mutations.
    StaleAnchor,
    /// The anchor falls inside a protected range.
    ProtectedRegionViolation,
    /// A delegated reviewer did not answer in time.
    ApprovalTimeout,
    /// The issue was deferred a second time.
    DeferredTwice,
    /// The approval gate said no.
    Rejected,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::StaleAnchor => "stale_anchor",
            SkipReason::ProtectedRegionViolation => "protected_region_violation",
            SkipReason::ApprovalTimeout => "approval_timeout",
            SkipReason::DeferredTwice => "deferred_twice",
            SkipReason::Rejected => "rejected",
        }
    }

    /// Skips are decided by the engine without consulting the approval gate.
    pub fn is_engine_skip(self) -> bool {
        matches!(
            self,
            SkipReason::StaleAnchor | SkipReason::ProtectedRegionViolation
        )
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The recorded outcome of offering one issue for approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub issue: Issue,
    pub approved: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<SkipReason>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,

    pub decided_at: DateTime<Utc>,

    /// Wall time between offering the issue and receiving the verdict.
    pub latency_ms: u64,

    /// Current line the anchor resolved to, when it resolved at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_line: Option<usize>,

    /// Whether the issue was deferred once before this decision.
    #[serde(default)]
    pub deferred: bool,
}

impl Decision {
    pub fn approved(issue: Issue, resolved_line: usize) -> Self {
        Self {
            issue,
            approved: true,
            reason: None,
            explanation: None,
            decided_at: Utc::now(),
            latency_ms: 0,
            resolved_line: Some(resolved_line),
            deferred: false,
        }
    }

    pub fn rejected(issue: Issue, reason: SkipReason, resolved_line: Option<usize>) -> Self {
        Self {
            issue,
            approved: false,
            reason: Some(reason),
            explanation: None,
            decided_at: Utc::now(),
            latency_ms: 0,
            resolved_line,
            deferred: false,
        }
    }

    pub fn with_explanation(mut self, explanation: Option<String>) -> Self {
        self.explanation = explanation;
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn with_deferred(mut self, deferred: bool) -> Self {
        self.deferred = deferred;
        self
    }
}
