//! Decision log: one JSON object per line, appended and never rewritten.
//!
//! Writers append whole lines under an exclusive file lock so records from
//! concurrent sessions (or processes) never interleave. Readers are tolerant:
//! a torn final line from an interrupted writer is reported, not fatal.

mod jsonl;
mod read;
mod stats;

pub use jsonl::{JsonlDecisionLog, LogError};
pub use read::{LogRead, SkippedLine, read_glob, read_records};
pub use stats::{LogStats, StatsRow, summarize};
