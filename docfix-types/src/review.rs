//! Types exchanged with approval surfaces.
//!
//! A [`ReviewRequest`] is everything a reviewer needs to judge one issue
//! without access to the document; delegated surfaces serialize it as JSON.

use crate::issue::Issue;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub schema: String,

    /// Unique per offer; a deferred issue gets a new id when re-offered.
    pub id: String,

    pub file_path: String,
    pub issue: Issue,
    pub context: ReviewContext,

    /// 1 on first offer, 2 after a deferral.
    pub attempt: u32,
}

impl ReviewRequest {
    pub fn new(id: String, file_path: String, issue: Issue, context: ReviewContext) -> Self {
        Self {
            schema: crate::schema::DOCFIX_REVIEW_V1.to_string(),
            id,
            file_path,
            issue,
            context,
            attempt: 1,
        }
    }
}

/// Current-vs-proposed view of an issue at decision time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewContext {
    /// Anchor after re-anchoring into the current snapshot.
    pub resolved_line: usize,

    /// Text currently at `resolved_line` (absent when appending).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<String>,

    /// Text that would be written (absent for deletions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposed: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub surrounding: Vec<ContextLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextLine {
    pub line: usize,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approve,
    Reject,
    Defer,
    /// The reviewer never answered.
    TimedOut,
}

/// What an approval gate returns for one offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateResponse {
    pub verdict: Verdict,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl GateResponse {
    pub fn approve() -> Self {
        Self {
            verdict: Verdict::Approve,
            explanation: None,
        }
    }

    pub fn reject() -> Self {
        Self {
            verdict: Verdict::Reject,
            explanation: None,
        }
    }

    pub fn defer() -> Self {
        Self {
            verdict: Verdict::Defer,
            explanation: None,
        }
    }

    pub fn timed_out() -> Self {
        Self {
            verdict: Verdict::TimedOut,
            explanation: None,
        }
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        let explanation = explanation.into();
        self.explanation = if explanation.trim().is_empty() {
            None
        } else {
            Some(explanation)
        };
        self
    }
}
