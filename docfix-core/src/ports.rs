//! Port traits abstracting all I/O away from the session engine.

use camino::{Utf8Path, Utf8PathBuf};
use docfix_types::record::DecisionRecord;

/// Where documents are read from and committed to.
pub trait DocumentStore: Send + Sync {
    /// Absolute, symlink-free form of `path`, used as the session lock key.
    fn canonicalize(&self, path: &Utf8Path) -> anyhow::Result<Utf8PathBuf>;
    fn read(&self, path: &Utf8Path) -> anyhow::Result<String>;
    /// Replace the document in one step: either the new contents land or the
    /// old ones stay.
    fn write(&self, path: &Utf8Path, contents: &str) -> anyhow::Result<()>;

    /// File whose advisory lock keeps other processes off `canonical`.
    /// `None` when the store is private to this process.
    fn lock_path(&self, canonical: &Utf8Path) -> Option<Utf8PathBuf> {
        let _ = canonical;
        None
    }
}

/// Append-only destination for decision records.
pub trait DecisionSink: Send + Sync {
    fn append(&self, record: &DecisionRecord) -> anyhow::Result<()>;
}
