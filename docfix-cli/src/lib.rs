//! Library half of the `docfix` binary: configuration, document discovery,
//! and source explanations. Kept separate from `main.rs` so it can be tested
//! without spawning the binary.

pub mod config;
pub mod discover;
pub mod explain;
