//! Configuration file loading for docfix.
//!
//! Discovers and loads `docfix.toml` from the working directory.
//! Merges config file settings with CLI arguments (CLI takes precedence).

use anyhow::{Context, bail};
use camino::{Utf8Path, Utf8PathBuf};
use docfix_core::{PersistMode, SessionSettings};
use docfix_domain::{RuleSource, SourceSpec};
use docfix_types::summary::ToolInfo;
use fs_err as fs;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// The config file name to search for.
pub const CONFIG_FILE_NAME: &str = "docfix.toml";

/// Top-level configuration from docfix.toml.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DocfixConfig {
    pub session: SessionConfig,
    pub discovery: DiscoveryConfig,
    /// Rule sources in the order their issues are offered.
    pub sources: Vec<SourceSpec>,
}

/// Who approves proposed edits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    /// Prompt on the terminal for every issue.
    #[default]
    Interactive,
    ApproveAll,
    RejectAll,
    /// Approve issues whose confidence reaches `threshold`.
    Threshold,
    /// Hand requests to an external reviewer through `queue_dir`.
    Delegated,
}

/// Session section of the config.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub approval: ApprovalMode,

    /// Minimum confidence for `approval = "threshold"`.
    pub threshold: f64,

    /// How long a delegated reviewer has to answer.
    pub timeout_secs: u64,

    /// Drop box for delegated review requests.
    pub queue_dir: Utf8PathBuf,

    pub persist: PersistMode,

    /// Detection workers per document (default: one per source).
    pub jobs: Option<usize>,

    /// Kill `command` and `rewrite` programs after this long; 0 disables.
    pub detector_timeout_secs: u64,

    /// Committed decision log.
    pub log_path: Utf8PathBuf,

    /// Where dry-run decisions are recorded.
    pub preview_log_path: Utf8PathBuf,

    /// Persist detection results between runs.
    pub cache_dir: Option<Utf8PathBuf>,

    pub protect_mdx: bool,

    pub dry_run: bool,

    /// Lines of context shown around each issue.
    pub context_radius: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            approval: ApprovalMode::default(),
            threshold: 0.8,
            timeout_secs: 300,
            queue_dir: Utf8PathBuf::from(".docfix/queue"),
            persist: PersistMode::default(),
            jobs: None,
            detector_timeout_secs: 120,
            log_path: Utf8PathBuf::from(".docfix/decisions.jsonl"),
            preview_log_path: Utf8PathBuf::from(".docfix/preview.jsonl"),
            cache_dir: None,
            protect_mdx: true,
            dry_run: false,
            context_radius: 2,
        }
    }
}

/// Discovery section of the config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// File name patterns selected when a directory is given.
    pub include: Vec<String>,

    /// Patterns (file name or path relative to the given directory) to skip.
    pub exclude: Vec<String>,

    /// Descend into subdirectories.
    pub recursive: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            include: vec!["*.md".to_string(), "*.mdx".to_string()],
            exclude: Vec::new(),
            recursive: true,
        }
    }
}

/// Sources used when the config file declares none.
pub fn default_sources() -> Vec<SourceSpec> {
    vec![
        SourceSpec::new("whitespace", RuleSource::TrailingWhitespace),
        SourceSpec::new("blank-lines", RuleSource::BlankLines { max_consecutive: 1 }),
    ]
}

/// Discover the docfix.toml config file.
///
/// Returns `None` if no config file is found in `dir`.
pub fn discover_config(dir: &Utf8Path) -> Option<Utf8PathBuf> {
    let config_path = dir.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        debug!("found config file at {}", config_path);
        Some(config_path)
    } else {
        debug!("no config file found at {}", config_path);
        None
    }
}

/// Load and parse a docfix.toml config file.
pub fn load_config(path: &Utf8Path) -> anyhow::Result<DocfixConfig> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config file {}", path))?;
    parse_config(&contents).with_context(|| format!("parse config file {}", path))
}

/// Parse a config file from a string.
pub fn parse_config(contents: &str) -> anyhow::Result<DocfixConfig> {
    let config: DocfixConfig = toml::from_str(contents).context("invalid TOML")?;
    Ok(config)
}

/// Load config from `dir`, or return the default if there is none.
pub fn load_or_default(dir: &Utf8Path) -> anyhow::Result<DocfixConfig> {
    match discover_config(dir) {
        Some(path) => load_config(&path),
        None => Ok(DocfixConfig::default()),
    }
}

/// `docfix run` flags that can override the config file.
///
/// `None` and empty lists leave the config file value in place.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub approval: Option<ApprovalMode>,
    pub threshold: Option<f64>,
    pub timeout_secs: Option<u64>,
    pub queue_dir: Option<Utf8PathBuf>,
    pub dry_run: bool,
    pub per_issue: bool,
    pub recursive: Option<bool>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub jobs: Option<usize>,
    pub detector_timeout_secs: Option<u64>,
    pub log_path: Option<Utf8PathBuf>,
    pub cache_dir: Option<Utf8PathBuf>,
    /// Source names to run, in this order.
    pub sources: Vec<String>,
}

/// Merged configuration combining config file and CLI arguments.
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub session: SessionConfig,
    pub discovery: DiscoveryConfig,
    pub sources: Vec<SourceSpec>,
}

impl MergedConfig {
    /// Approval mode actually used. Dry runs never prompt: every issue is
    /// previewed as approved.
    pub fn effective_approval(&self) -> ApprovalMode {
        if self.session.dry_run && self.session.approval == ApprovalMode::Interactive {
            ApprovalMode::ApproveAll
        } else {
            self.session.approval
        }
    }

    pub fn session_settings(&self, tool: ToolInfo) -> SessionSettings {
        SessionSettings {
            persist: self.session.persist,
            dry_run: self.session.dry_run,
            jobs: self.session.jobs,
            detector_timeout: match self.session.detector_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            protect_mdx: self.session.protect_mdx,
            context_radius: self.session.context_radius,
            cache_dir: self.session.cache_dir.clone(),
            tool,
        }
    }
}

/// Builder for merging config file with CLI arguments.
pub struct ConfigMerger {
    config: DocfixConfig,
}

impl ConfigMerger {
    pub fn new(config: DocfixConfig) -> Self {
        Self { config }
    }

    /// Merge with `docfix run` arguments.
    ///
    /// CLI `include` and `exclude` lists extend the config file lists; scalar
    /// flags override. `sources` selects and reorders configured sources.
    pub fn merge_run_args(self, cli: &RunOverrides) -> anyhow::Result<MergedConfig> {
        let DocfixConfig {
            mut session,
            mut discovery,
            sources,
        } = self.config;

        if let Some(approval) = cli.approval {
            session.approval = approval;
        }
        if let Some(threshold) = cli.threshold {
            session.threshold = threshold;
        }
        if !(0.0..=1.0).contains(&session.threshold) {
            bail!("threshold must be within [0, 1], got {}", session.threshold);
        }
        if let Some(timeout) = cli.timeout_secs {
            session.timeout_secs = timeout;
        }
        if let Some(dir) = &cli.queue_dir {
            session.queue_dir = dir.clone();
        }
        session.dry_run |= cli.dry_run;
        if cli.per_issue {
            session.persist = PersistMode::PerIssue;
        }
        if cli.jobs.is_some() {
            session.jobs = cli.jobs;
        }
        if let Some(secs) = cli.detector_timeout_secs {
            session.detector_timeout_secs = secs;
        }
        if let Some(path) = &cli.log_path {
            session.log_path = path.clone();
        }
        if cli.cache_dir.is_some() {
            session.cache_dir = cli.cache_dir.clone();
        }

        for pattern in &cli.include {
            if !discovery.include.contains(pattern) {
                discovery.include.push(pattern.clone());
            }
        }
        for pattern in &cli.exclude {
            if !discovery.exclude.contains(pattern) {
                discovery.exclude.push(pattern.clone());
            }
        }
        if let Some(recursive) = cli.recursive {
            discovery.recursive = recursive;
        }

        let sources = if sources.is_empty() {
            default_sources()
        } else {
            sources
        };
        let sources = select_sources(sources, &cli.sources)?;

        Ok(MergedConfig {
            session,
            discovery,
            sources,
        })
    }
}

fn select_sources(available: Vec<SourceSpec>, names: &[String]) -> anyhow::Result<Vec<SourceSpec>> {
    if names.is_empty() {
        return Ok(available);
    }
    names
        .iter()
        .map(|name| {
            available
                .iter()
                .find(|s| &s.name == name)
                .cloned()
                .with_context(|| {
                    let known: Vec<&str> = available.iter().map(|s| s.name.as_str()).collect();
                    format!("unknown source `{}` (configured: {})", name, known.join(", "))
                })
        })
        .collect()
}
