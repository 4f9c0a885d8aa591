use camino::{Utf8Path, Utf8PathBuf};
use docfix_types::record::DecisionRecord;
use fs2::FileExt;
use std::io::Write;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("decision log {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode decision record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Append handle to a JSON Lines decision log.
///
/// Open once per process and share it between sessions.
#[derive(Debug)]
pub struct JsonlDecisionLog {
    path: Utf8PathBuf,
    file: Mutex<fs_err::File>,
}

impl JsonlDecisionLog {
    /// Open (creating if needed) the log at `path`, including parent directories.
    pub fn open(path: impl Into<Utf8PathBuf>) -> Result<Self, LogError> {
        let path = path.into();
        let io = |source| LogError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
            fs_err::create_dir_all(parent).map_err(io)?;
        }
        let file = fs_err::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io)?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Append one record as a single line and flush it to disk.
    pub fn append(&self, record: &DecisionRecord) -> Result<(), LogError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let io = |source| LogError::Io {
            path: self.path.clone(),
            source,
        };

        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        file.file().lock_exclusive().map_err(io)?;
        let written = file
            .write_all(&line)
            .and_then(|_| file.file().sync_data());
        let unlocked = FileExt::unlock(file.file());
        written.map_err(io)?;
        unlocked.map_err(io)?;

        trace!(path = %self.path, source = %record.source_id, "appended decision");
        Ok(())
    }
}
