//! Embeddable session engine for docfix.
//!
//! Provides a clap-free, I/O-abstracted entry point suitable for linking
//! into an editor integration or other host process.
//!
//! # Port traits
//!
//! All I/O is abstracted behind port traits in [`ports`]:
//! - [`DocumentStore`](ports::DocumentStore): read and atomically write documents
//! - [`DecisionSink`](ports::DecisionSink): append decision records
//!
//! The [`adapters`] module provides filesystem-backed and in-memory
//! implementations.
//!
//! # Entry points
//!
//! - [`run_session`](pipeline::run_session): process a batch of documents
//! - [`Session::run`](session::Session::run): process a single document

pub mod adapters;
pub mod approval;
pub mod cancel;
pub mod detect;
pub mod error;
pub mod lock;
pub mod pipeline;
pub mod ports;
pub mod session;
pub mod settings;

pub use approval::{
    ApprovalGate, ApprovalSurface, ChannelSurface, DelegatedGate, DirectorySurface,
    InteractiveGate, ReviewTicket, SilentGate,
};
pub use cancel::CancelToken;
pub use error::SessionError;
pub use pipeline::{RunOutcome, exit_code, run_session};
pub use session::{Session, SessionContext, SessionOutcome};
pub use settings::{PersistMode, SessionSettings};

// Re-export the source types so embedders don't need docfix-domain directly.
pub use docfix_domain::{DetectionCache, RuleSource, SourceSpec};
