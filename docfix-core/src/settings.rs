//! Clap-free settings for document sessions.

use camino::Utf8PathBuf;
use std::time::Duration;
use docfix_types::summary::ToolInfo;
use serde::{Deserialize, Serialize};

/// When approved edits reach the file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistMode {
    /// One atomic write when the session finishes.
    #[default]
    EndOfSession,
    /// An atomic write after every approved edit.
    PerIssue,
}

/// Settings for one `run_session` invocation.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub persist: PersistMode,
    /// Record previews only; never touch documents or the committed log.
    pub dry_run: bool,

    /// Detection workers per session. `None` means one per source.
    pub jobs: Option<usize>,
    /// Kill external source programs that run longer than this.
    pub detector_timeout: Option<Duration>,
    /// Compute protected ranges for `.mdx` documents.
    pub protect_mdx: bool,
    /// Lines shown either side of the anchor in review requests.
    pub context_radius: usize,
    pub cache_dir: Option<Utf8PathBuf>,

    pub tool: ToolInfo,
}

impl SessionSettings {
    pub fn workers(&self, sources: usize) -> usize {
        self.jobs.unwrap_or(sources).clamp(1, sources.max(1))
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            persist: PersistMode::default(),
            dry_run: false,
            jobs: None,
            detector_timeout: None,
            protect_mdx: true,
            context_radius: 2,
            cache_dir: None,
            tool: ToolInfo {
                name: "docfix".to_string(),
                version: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workers_default_to_one_per_source() {
        let settings = SessionSettings::default();
        assert_eq!(settings.workers(3), 3);
        assert_eq!(settings.workers(0), 1);
    }

    #[test]
    fn workers_are_capped_by_source_count() {
        let settings = SessionSettings {
            jobs: Some(8),
            ..SessionSettings::default()
        };
        assert_eq!(settings.workers(2), 2);

        let settings = SessionSettings {
            jobs: Some(0),
            ..SessionSettings::default()
        };
        assert_eq!(settings.workers(2), 1);
    }
}
