//! Error types for docfix-edit.
//!
//! Errors fall in two groups:
//! - Skips: the issue cannot be applied to the current snapshot (stale anchor,
//!   protected line). The session records a decision and moves on.
//! - Runtime errors: invalid content or I/O failures. These end the session.

use docfix_types::decision::SkipReason;
use thiserror::Error;

/// Why an anchor could not be mapped into the current document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnchorError {
    /// The issue was computed against a different snapshot than the tracker's base.
    #[error("issue targets snapshot version {found}, session base is version {expected}")]
    VersionMismatch { expected: u64, found: u64 },

    #[error("anchor line {line} is outside 1..={max}")]
    OutOfRange { line: usize, max: usize },

    /// The targeted line was removed by an earlier decision.
    #[error("anchor line {line} was deleted earlier in the session")]
    Deleted { line: usize },
}

#[derive(Debug, Error)]
pub enum EditError {
    #[error("stale anchor: {0}")]
    Stale(#[from] AnchorError),

    #[error("line {line} is inside a protected range")]
    Protected { line: usize },

    /// Issue content would break the one-entry-per-line model.
    #[error("invalid content for line {line}: {message}")]
    InvalidContent { line: usize, message: String },

    #[error("runtime error: {0}")]
    Runtime(#[from] anyhow::Error),
}

impl EditError {
    /// The per-issue skip this error maps to, if it is not fatal.
    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            EditError::Stale(_) => Some(SkipReason::StaleAnchor),
            EditError::Protected { .. } => Some(SkipReason::ProtectedRegionViolation),
            EditError::InvalidContent { .. } | EditError::Runtime(_) => None,
        }
    }

    pub fn is_skip(&self) -> bool {
        self.skip_reason().is_some()
    }
}

pub type EditResult<T> = Result<T, EditError>;
