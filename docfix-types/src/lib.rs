//! Shared DTOs (schemas-as-code) for the docfix workspace.
//!
//! # Design constraints
//! - Decision records are appended to disk and read by independent consumers.
//! - Be conservative with breaking changes.
//! - Prefer adding optional fields over changing semantics.

pub mod decision;
pub mod issue;
pub mod record;
pub mod review;
pub mod summary;

/// Schema identifiers.
pub mod schema {
    pub const DOCFIX_DECISION_V1: &str = "docfix.decision.v1";
    pub const DOCFIX_SESSION_V1: &str = "docfix.session.v1";
    pub const DOCFIX_RUN_V1: &str = "docfix.run.v1";
    pub const DOCFIX_REVIEW_V1: &str = "docfix.review.v1";
}
