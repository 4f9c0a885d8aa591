//! Detection cache keyed by source configuration and document content.
//!
//! The in-memory layer runs each key's detection at most once per process even
//! when several sessions ask for it concurrently. Published entries are read
//! without locking. The optional directory layer survives restarts: one
//! `<key>.json` file per entry, written atomically.

use crate::sources::{DetectorError, RunLimits, SourceSpec, stamp};
use camino::{Utf8Path, Utf8PathBuf};
use docfix_edit::{Snapshot, atomic_write};
use docfix_types::issue::{Issue, IssueDraft};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tracing::{debug, warn};

const CACHE_SCHEMA: &str = "docfix.cache.v1";

/// One key's entry. `fill` is only taken on a miss; once `ready` is set,
/// readers never touch it.
#[derive(Debug, Default)]
struct Slot {
    ready: OnceLock<Arc<Vec<IssueDraft>>>,
    fill: Mutex<()>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedDetection {
    schema: String,
    source: String,
    drafts: Vec<IssueDraft>,
}

#[derive(Debug, Default)]
pub struct DetectionCache {
    slots: Mutex<HashMap<String, Arc<Slot>>>,
    dir: Option<Utf8PathBuf>,
    computed: AtomicU64,
}

impl DetectionCache {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn with_dir(dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            ..Self::default()
        }
    }

    pub fn dir(&self) -> Option<&Utf8Path> {
        self.dir.as_deref()
    }

    /// Number of detections actually run (cache misses that succeeded or failed).
    pub fn computed(&self) -> u64 {
        self.computed.load(Ordering::Relaxed)
    }

    /// Fingerprint of everything a source's output depends on.
    pub fn key(spec: &SourceSpec, snapshot: &Snapshot) -> String {
        let config = serde_json::to_string(&spec.source).unwrap_or_default();
        let content = snapshot.render();
        let mut parts = vec![spec.name.as_str(), config.as_str(), content.as_str()];
        // External programs see the path too.
        if spec.source.is_external() {
            parts.push(snapshot.path().as_str());
        }
        docfix_hash::fingerprint(parts)
    }

    /// Cached equivalent of [`SourceSpec::detect`]. Failures are not cached.
    pub fn detect(&self, spec: &SourceSpec, snapshot: &Snapshot) -> Result<Vec<Issue>, DetectorError> {
        self.detect_within(spec, snapshot, RunLimits::default())
    }

    /// Cached equivalent of [`SourceSpec::detect_within`]. Limits only apply
    /// on a miss; timeouts and cancellations are failures and not cached.
    pub fn detect_within(
        &self,
        spec: &SourceSpec,
        snapshot: &Snapshot,
        limits: RunLimits<'_>,
    ) -> Result<Vec<Issue>, DetectorError> {
        let key = Self::key(spec, snapshot);
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(key.clone()).or_default())
        };

        if let Some(drafts) = slot.ready.get() {
            debug!(source = %spec.name, "detection cache hit (memory)");
            return Ok(stamp(&spec.name, snapshot, drafts.as_ref().clone()));
        }

        // Misses on one key wait here so only the first one computes.
        let _fill = slot.fill.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(drafts) = slot.ready.get() {
            debug!(source = %spec.name, "detection cache hit (memory, after wait)");
            return Ok(stamp(&spec.name, snapshot, drafts.as_ref().clone()));
        }

        if let Some(drafts) = self.read_disk(&key, &spec.name) {
            debug!(source = %spec.name, "detection cache hit (disk)");
            let drafts = slot.ready.get_or_init(|| Arc::new(drafts));
            return Ok(stamp(&spec.name, snapshot, drafts.as_ref().clone()));
        }

        self.computed.fetch_add(1, Ordering::Relaxed);
        let drafts = spec.source.detect_within(snapshot, limits)?;
        self.write_disk(&key, &spec.name, &drafts);
        let _ = slot.ready.set(Arc::new(drafts.clone()));
        Ok(stamp(&spec.name, snapshot, drafts))
    }

    fn entry_path(&self, key: &str) -> Option<Utf8PathBuf> {
        self.dir.as_ref().map(|dir| dir.join(format!("{key}.json")))
    }

    fn read_disk(&self, key: &str, source: &str) -> Option<Vec<IssueDraft>> {
        let path = self.entry_path(key)?;
        let raw = fs_err::read_to_string(&path).ok()?;
        match serde_json::from_str::<CachedDetection>(&raw) {
            Ok(cached) if cached.schema == CACHE_SCHEMA && cached.source == source => {
                Some(cached.drafts)
            }
            Ok(_) => None,
            Err(e) => {
                warn!(path = %path, error = %e, "ignoring unreadable cache entry");
                None
            }
        }
    }

    fn write_disk(&self, key: &str, source: &str, drafts: &[IssueDraft]) {
        let (Some(dir), Some(path)) = (self.dir.as_ref(), self.entry_path(key)) else {
            return;
        };
        let cached = CachedDetection {
            schema: CACHE_SCHEMA.to_string(),
            source: source.to_string(),
            drafts: drafts.to_vec(),
        };
        let result = fs_err::create_dir_all(dir)
            .map_err(anyhow::Error::from)
            .and_then(|_| Ok(serde_json::to_string_pretty(&cached)?))
            .and_then(|json| atomic_write(&path, &json));
        if let Err(e) = result {
            warn!(path = %path, error = %e, "failed to write cache entry");
        }
    }
}
