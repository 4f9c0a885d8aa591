use anyhow::Context;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use docfix_cli::config::{self, ApprovalMode, ConfigMerger, MergedConfig, RunOverrides};
use docfix_cli::discover::discover_documents;
use docfix_cli::explain::{render_explanation, render_source_list, source_list_json};
use docfix_core::adapters::{FsDocumentStore, NullDecisionSink};
use docfix_core::ports::DecisionSink;
use docfix_core::{
    ApprovalGate, CancelToken, DelegatedGate, DetectionCache, DirectorySurface, InteractiveGate,
    SessionContext, SilentGate, exit_code, run_session,
};
use docfix_domain::{list_source_kinds, lookup_source};
use docfix_log::{JsonlDecisionLog, read_glob, summarize};
use docfix_render::{render_run_md, render_run_text, render_stats_text};
use docfix_types::summary::ToolInfo;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "docfix",
    version,
    about = "Issue-driven, approval-gated fixes for text documents."
)]
struct Cli {
    /// Log progress to stderr (RUST_LOG takes precedence).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Detect issues in documents, review them, and apply approved edits.
    Run(RunArgs),
    /// List the available rule source kinds.
    ListSources(ListSourcesArgs),
    /// Explain what a rule source kind does and how to configure it.
    Explain(ExplainArgs),
    /// Inspect the decision log.
    Log(LogArgs),
}

#[derive(Debug, Parser)]
struct RunArgs {
    /// Files or directories to process.
    #[arg(default_value = ".")]
    paths: Vec<Utf8PathBuf>,

    /// Config file (default: ./docfix.toml when present).
    #[arg(long)]
    config: Option<Utf8PathBuf>,

    /// Run only the named sources, in this order.
    #[arg(long = "source", value_name = "NAME")]
    sources: Vec<String>,

    /// Who approves each edit.
    #[arg(long, value_enum)]
    approval: Option<ApprovalMode>,

    /// Minimum confidence for `--approval threshold`.
    #[arg(long)]
    threshold: Option<f64>,

    /// Seconds a delegated reviewer has to answer.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Drop box for `--approval delegated`.
    #[arg(long)]
    queue_dir: Option<Utf8PathBuf>,

    /// Preview decisions without modifying documents or the decision log.
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Write each approved edit to disk immediately.
    #[arg(long, default_value_t = false)]
    per_issue: bool,

    /// Descend into subdirectories.
    #[arg(long, overrides_with = "no_recursive")]
    recursive: bool,

    /// Only look at the top level of directory arguments.
    #[arg(long, overrides_with = "recursive")]
    no_recursive: bool,

    /// Additional file name patterns to include.
    #[arg(long)]
    include: Vec<String>,

    /// Additional patterns to exclude.
    #[arg(long)]
    exclude: Vec<String>,

    /// Detection workers per document.
    #[arg(long)]
    jobs: Option<usize>,

    /// Kill external source programs after this many seconds (0: never).
    #[arg(long)]
    detector_timeout_secs: Option<u64>,

    /// Decision log path.
    #[arg(long)]
    log: Option<Utf8PathBuf>,

    /// Persist detection results in this directory.
    #[arg(long)]
    cache_dir: Option<Utf8PathBuf>,

    /// Report format.
    #[arg(long, value_enum, default_value = "text")]
    format: ReportFormat,

    /// Print a unified diff of all changes.
    #[arg(long, default_value_t = false)]
    diff: bool,
}

impl RunArgs {
    fn overrides(&self) -> RunOverrides {
        let recursive = match (self.recursive, self.no_recursive) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        RunOverrides {
            approval: self.approval,
            threshold: self.threshold,
            timeout_secs: self.timeout_secs,
            queue_dir: self.queue_dir.clone(),
            dry_run: self.dry_run,
            per_issue: self.per_issue,
            recursive,
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            jobs: self.jobs,
            detector_timeout_secs: self.detector_timeout_secs,
            log_path: self.log.clone(),
            cache_dir: self.cache_dir.clone(),
            sources: self.sources.clone(),
        }
    }
}

#[derive(Debug, Parser)]
struct ListSourcesArgs {
    /// Output format (text, json).
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Parser)]
struct ExplainArgs {
    /// Source kind to explain (e.g. "terms", "blank-lines").
    kind: String,
}

#[derive(Debug, Parser)]
struct LogArgs {
    #[command(subcommand)]
    cmd: LogCommand,
}

#[derive(Debug, Subcommand)]
enum LogCommand {
    /// Approval statistics per source and issue type.
    Summary(SummaryArgs),
}

#[derive(Debug, Parser)]
struct SummaryArgs {
    /// Decision log path or glob (default: the configured log).
    #[arg(long)]
    log: Option<String>,

    /// Config file (default: ./docfix.toml when present).
    #[arg(long)]
    config: Option<Utf8PathBuf>,

    /// Output format (text, json).
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum ReportFormat {
    Text,
    Json,
    Md,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match real_main(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:?}", e);
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn real_main(cli: Cli) -> anyhow::Result<u8> {
    match cli.cmd {
        Command::Run(args) => cmd_run(args),
        Command::ListSources(args) => cmd_list_sources(args).map(|_| 0),
        Command::Explain(args) => cmd_explain(args).map(|_| 0),
        Command::Log(LogArgs {
            cmd: LogCommand::Summary(args),
        }) => cmd_log_summary(args).map(|_| 0),
    }
}

fn load_config(explicit: Option<&Utf8PathBuf>) -> anyhow::Result<config::DocfixConfig> {
    match explicit {
        Some(path) => config::load_config(path),
        None => config::load_or_default(&Utf8PathBuf::from(".")).context("load docfix.toml config"),
    }
}

fn tool_info() -> ToolInfo {
    ToolInfo {
        name: "docfix".to_string(),
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
    }
}

fn build_gate(merged: &MergedConfig) -> Box<dyn ApprovalGate> {
    match merged.effective_approval() {
        ApprovalMode::Interactive => Box::new(InteractiveGate::stdio()),
        ApprovalMode::ApproveAll => Box::new(SilentGate::ApproveAll),
        ApprovalMode::RejectAll => Box::new(SilentGate::RejectAll),
        ApprovalMode::Threshold => {
            Box::new(SilentGate::ConfidenceThreshold(merged.session.threshold))
        }
        ApprovalMode::Delegated => Box::new(DelegatedGate::new(
            DirectorySurface::new(merged.session.queue_dir.clone()),
            Duration::from_secs(merged.session.timeout_secs),
        )),
    }
}

fn cmd_run(args: RunArgs) -> anyhow::Result<u8> {
    let file_config = load_config(args.config.as_ref())?;
    let merged = ConfigMerger::new(file_config).merge_run_args(&args.overrides())?;
    debug!(
        "merged config: approval={:?}, dry_run={}, sources={:?}",
        merged.effective_approval(),
        merged.session.dry_run,
        merged.sources.iter().map(|s| s.name.as_str()).collect::<Vec<_>>()
    );

    let documents = discover_documents(&args.paths, &merged.discovery)?;
    if documents.is_empty() {
        warn!("no documents matched");
    }

    let dry_run = merged.session.dry_run;
    let committed: Box<dyn DecisionSink> = if dry_run {
        Box::new(NullDecisionSink)
    } else {
        Box::new(
            JsonlDecisionLog::open(merged.session.log_path.clone())
                .with_context(|| format!("open decision log {}", merged.session.log_path))?,
        )
    };
    let preview = if dry_run {
        Some(
            JsonlDecisionLog::open(merged.session.preview_log_path.clone()).with_context(|| {
                format!("open preview log {}", merged.session.preview_log_path)
            })?,
        )
    } else {
        None
    };
    let cache = match &merged.session.cache_dir {
        Some(dir) => DetectionCache::with_dir(dir.clone()),
        None => DetectionCache::in_memory(),
    };

    let store = FsDocumentStore;
    let ctx = SessionContext {
        store: &store,
        log: committed.as_ref(),
        preview: preview.as_ref().map(|log| log as &dyn DecisionSink),
        cache: &cache,
        cancel: CancelToken::new(),
    };
    let settings = merged.session_settings(tool_info());
    let mut gate = build_gate(&merged);

    let outcome = run_session(&documents, &merged.sources, gate.as_mut(), &settings, &ctx)?;

    match args.format {
        ReportFormat::Text => print!("{}", render_run_text(&outcome.report)),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome.report)?),
        ReportFormat::Md => print!("{}", render_run_md(&outcome.report)),
    }
    if args.diff {
        print!("{}", outcome.patch());
    }

    Ok(exit_code(&outcome.report))
}

fn cmd_list_sources(args: ListSourcesArgs) -> anyhow::Result<()> {
    match args.format {
        OutputFormat::Text => print!("{}", render_source_list()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&source_list_json())?),
    }
    Ok(())
}

fn cmd_explain(args: ExplainArgs) -> anyhow::Result<()> {
    let Some(info) = lookup_source(&args.kind) else {
        let available = list_source_kinds().join(", ");
        anyhow::bail!(
            "Unknown source kind: '{}'\n\nAvailable kinds: {}",
            args.kind,
            available
        );
    };
    print!("{}", render_explanation(info));
    Ok(())
}

fn cmd_log_summary(args: SummaryArgs) -> anyhow::Result<()> {
    let pattern = match args.log {
        Some(pattern) => pattern,
        None => load_config(args.config.as_ref())?
            .session
            .log_path
            .into_string(),
    };

    let read = read_glob(&pattern)?;
    for skipped in &read.skipped {
        warn!(path = %skipped.path, line = skipped.line, "skipped malformed record: {}", skipped.message);
    }
    let stats = summarize(&read.records);

    match args.format {
        OutputFormat::Text => print!("{}", render_stats_text(&stats)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
    }
    Ok(())
}
