//! Edit engine for docfix sessions.
//!
//! Responsibilities:
//! - Hold an immutable, versioned view of a document ([`Snapshot`]).
//! - Map issue anchors from the session's base coordinates to the current
//!   document ([`OffsetTracker`]).
//! - Apply approved decisions in memory ([`apply_decision`]).
//! - Persist the result atomically and render a unified diff preview.

pub mod apply;
pub mod error;
pub mod offsets;
pub mod patch;
pub mod persist;
pub mod snapshot;

pub use apply::apply_decision;
pub use error::{AnchorError, EditError, EditResult};
pub use offsets::{OffsetTracker, Shift};
pub use patch::render_patch;
pub use persist::atomic_write;
pub use snapshot::{LineEnding, ProtectedRange, Snapshot};
