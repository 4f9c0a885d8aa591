//! Multi-document entry point.

use crate::approval::ApprovalGate;
use crate::session::{Session, SessionContext};
use crate::settings::SessionSettings;
use anyhow::Context;
use camino::Utf8PathBuf;
use docfix_domain::{SourceSpec, validate_source_names};
use docfix_types::summary::RunReport;
use tracing::debug;

/// Outcome of `run_session`.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: RunReport,
    /// `(path, unified diff)` for every document whose content changed.
    pub patches: Vec<(Utf8PathBuf, String)>,
}

impl RunOutcome {
    /// All per-document diffs concatenated, in run order.
    pub fn patch(&self) -> String {
        self.patches.iter().map(|(_, p)| p.as_str()).collect()
    }
}

/// Run one session per path, in order, sharing the gate, sinks and cache.
///
/// Returns `Err` only for invalid input (bad source configuration). Per-file
/// failures are reported in the corresponding session summary.
pub fn run_session(
    paths: &[Utf8PathBuf],
    sources: &[SourceSpec],
    gate: &mut dyn ApprovalGate,
    settings: &SessionSettings,
    ctx: &SessionContext<'_>,
) -> anyhow::Result<RunOutcome> {
    validate_source_names(sources).context("invalid source configuration")?;

    let mut report = RunReport::new(settings.tool.clone(), settings.dry_run);
    let mut patches = Vec::new();
    for path in paths {
        if ctx.cancel.is_cancelled() {
            debug!(path = %path, "run cancelled, skipping remaining documents");
            break;
        }
        let outcome = Session::new(path.clone(), sources, settings, ctx).run(gate);
        if !outcome.patch.is_empty() {
            patches.push((path.clone(), outcome.patch));
        }
        report.push(outcome.summary);
    }

    Ok(RunOutcome { report, patches })
}

/// Process exit code for a finished run.
///
/// `0` when every session completed cleanly, `2` when the run is worth
/// retrying as-is (detector failures, lock contention), `1` for any other
/// fatal condition.
pub fn exit_code(report: &RunReport) -> u8 {
    let mut code = 0;
    for session in &report.sessions {
        match &session.fatal {
            Some(cause) if !cause.kind.is_retryable() => return 1,
            Some(_) => code = 2,
            None if session.partial => code = 2,
            None => {}
        }
    }
    code
}

#[cfg(test)]
mod tests {
    use super::*;
    use docfix_types::summary::{FatalCause, FatalKind, SessionSummary, ToolInfo};

    fn report(sessions: Vec<SessionSummary>) -> RunReport {
        let mut report = RunReport::new(
            ToolInfo {
                name: "docfix".to_string(),
                version: None,
            },
            false,
        );
        for s in sessions {
            report.push(s);
        }
        report
    }

    fn session(fatal: Option<FatalKind>, partial: bool) -> SessionSummary {
        let mut s = SessionSummary::new("id".to_string(), "a.md".to_string(), false);
        s.partial = partial;
        s.aborted = fatal.is_some();
        s.fatal = fatal.map(|kind| FatalCause {
            kind,
            message: String::new(),
        });
        s
    }

    #[test]
    fn clean_run_exits_zero() {
        assert_eq!(exit_code(&report(vec![session(None, false)])), 0);
        assert_eq!(exit_code(&report(vec![])), 0);
    }

    #[test]
    fn partial_and_contention_exit_two() {
        assert_eq!(exit_code(&report(vec![session(None, true)])), 2);
        assert_eq!(
            exit_code(&report(vec![session(Some(FatalKind::LockContention), false)])),
            2
        );
    }

    #[test]
    fn fatal_wins_over_partial() {
        let sessions = vec![
            session(None, true),
            session(Some(FatalKind::PersistenceFailure), false),
        ];
        assert_eq!(exit_code(&report(sessions)), 1);
    }
}
