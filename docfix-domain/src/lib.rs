//! Domain logic: which edits to propose for a document, and in what order.
//!
//! This crate owns *what* gets proposed. It does not own approval or how
//! edits are applied; those live in `docfix-core` and `docfix-edit`.

pub mod cache;
pub mod diff;
pub mod merge;
pub mod protect;
pub mod registry;
pub mod sources;

pub use cache::DetectionCache;
pub use merge::{merge_issues, validate_source_names};
pub use protect::{is_mdx, mdx_protected_ranges};
pub use registry::{SOURCE_REGISTRY, SourceInfo, list_source_kinds, lookup_source};
pub use sources::{DetectorError, RuleSource, RunLimits, SourceSpec};
