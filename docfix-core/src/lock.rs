//! Exclusive claims on documents with an active session.
//!
//! Sessions in this process are tracked in a registry keyed by canonical
//! path. Stores shared with other processes also name a sidecar file, which
//! is held under an exclusive advisory lock for as long as the claim lives.

use camino::{Utf8Path, Utf8PathBuf};
use fs2::FileExt;
use std::collections::HashSet;
use std::io;
use std::sync::{Mutex, OnceLock, PoisonError};
use tracing::{debug, trace};

fn active() -> &'static Mutex<HashSet<Utf8PathBuf>> {
    static ACTIVE: OnceLock<Mutex<HashSet<Utf8PathBuf>>> = OnceLock::new();
    ACTIVE.get_or_init(Mutex::default)
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// Exclusive claim on a document for the lifetime of one session.
///
/// Released on drop. Keys are compared verbatim, so callers pass a
/// canonical path.
#[derive(Debug)]
pub struct DocumentLock {
    path: Utf8PathBuf,
    sidecar: Option<fs_err::File>,
}

impl DocumentLock {
    /// Claim `path`, or `Ok(None)` when another session holds it, in this
    /// process or (through `sidecar`) in another one.
    ///
    /// `Err` only when the sidecar file cannot be opened or locked for a
    /// reason other than contention.
    pub fn try_acquire(path: &Utf8Path, sidecar: Option<&Utf8Path>) -> io::Result<Option<Self>> {
        {
            let mut set = active().lock().unwrap_or_else(PoisonError::into_inner);
            if !set.insert(path.to_path_buf()) {
                return Ok(None);
            }
        }
        // From here on, dropping `lock` gives the registry entry back.
        let mut lock = Self {
            path: path.to_path_buf(),
            sidecar: None,
        };

        if let Some(sidecar) = sidecar {
            let file = fs_err::OpenOptions::new()
                .create(true)
                .truncate(false)
                .read(true)
                .write(true)
                .open(sidecar)?;
            match file.file().try_lock_exclusive() {
                Ok(()) => lock.sidecar = Some(file),
                Err(e) if is_contended(&e) => {
                    debug!(path = %path, sidecar = %sidecar, "document locked by another process");
                    return Ok(None);
                }
                Err(e) => return Err(e),
            }
        }

        trace!(path = %path, "document lock acquired");
        Ok(Some(lock))
    }

    /// Whether a session in this process holds `path`.
    pub fn is_held(path: &Utf8Path) -> bool {
        active()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(path)
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl Drop for DocumentLock {
    fn drop(&mut self) {
        // Closing the file would release it too; unlock first so the
        // registry never outlives the file lock.
        if let Some(file) = self.sidecar.take() {
            let _ = FileExt::unlock(file.file());
        }
        active()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.path);
        trace!(path = %self.path, "document lock released");
    }
}
