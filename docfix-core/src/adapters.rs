//! Default port implementations.

use crate::ports::{DecisionSink, DocumentStore};
use anyhow::{Context, bail};
use camino::{Utf8Path, Utf8PathBuf};
use docfix_edit::atomic_write;
use docfix_log::JsonlDecisionLog;
use docfix_types::record::DecisionRecord;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Documents on the local filesystem, committed with a temp-file rename.
#[derive(Debug, Clone, Default)]
pub struct FsDocumentStore;

impl DocumentStore for FsDocumentStore {
    fn canonicalize(&self, path: &Utf8Path) -> anyhow::Result<Utf8PathBuf> {
        let canonical = fs_err::canonicalize(path)?;
        Utf8PathBuf::from_path_buf(canonical)
            .map_err(|p| anyhow::anyhow!("non UTF-8 path: {}", p.display()))
    }

    fn read(&self, path: &Utf8Path) -> anyhow::Result<String> {
        fs_err::read_to_string(path).with_context(|| format!("read {}", path))
    }

    fn write(&self, path: &Utf8Path, contents: &str) -> anyhow::Result<()> {
        atomic_write(path, contents)
    }

    /// Hidden sibling: `docs/guide.md` is guarded by `docs/.guide.md.docfix.lock`.
    fn lock_path(&self, canonical: &Utf8Path) -> Option<Utf8PathBuf> {
        let name = canonical.file_name()?;
        Some(canonical.with_file_name(format!(".{name}.docfix.lock")))
    }
}

/// In-memory document store for embedding and testing.
///
/// Paths are used verbatim as their own canonical form.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    files: Mutex<BTreeMap<Utf8PathBuf, String>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<Utf8PathBuf>, contents: impl Into<String>) -> Self {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), contents.into());
        self
    }

    pub fn get(&self, path: &Utf8Path) -> Option<String> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    /// Make every subsequent write fail without changing stored contents.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn canonicalize(&self, path: &Utf8Path) -> anyhow::Result<Utf8PathBuf> {
        Ok(path.to_path_buf())
    }

    fn read(&self, path: &Utf8Path) -> anyhow::Result<String> {
        self.get(path)
            .with_context(|| format!("no such document: {}", path))
    }

    fn write(&self, path: &Utf8Path, contents: &str) -> anyhow::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("write to {} refused", path);
        }
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf(), contents.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl DecisionSink for JsonlDecisionLog {
    fn append(&self, record: &DecisionRecord) -> anyhow::Result<()> {
        Ok(JsonlDecisionLog::append(self, record)?)
    }
}

/// Discards every record. Stands in for the committed log during dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDecisionSink;

impl DecisionSink for NullDecisionSink {
    fn append(&self, _record: &DecisionRecord) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Collects records in memory.
#[derive(Debug, Default)]
pub struct InMemoryDecisionSink {
    records: Mutex<Vec<DecisionRecord>>,
    fail: AtomicBool,
}

impl InMemoryDecisionSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<DecisionRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every subsequent append fail.
    pub fn fail_appends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl DecisionSink for InMemoryDecisionSink {
    fn append(&self, record: &DecisionRecord) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("decision sink unavailable");
        }
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}
