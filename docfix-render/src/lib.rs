//! Rendering helpers for human-readable output: review prompts, run reports,
//! and decision-log statistics.

use docfix_log::{LogStats, StatsRow};
use docfix_types::issue::IssueKind;
use docfix_types::review::ReviewRequest;
use docfix_types::summary::{RunReport, SessionState, SessionSummary};

/// Text shown to a reviewer for one issue.
pub fn render_review_prompt(request: &ReviewRequest) -> String {
    let issue = &request.issue;
    let ctx = &request.context;
    let mut out = String::new();

    out.push_str(&format!(
        "\n{}:{} [{}] {}",
        request.file_path,
        ctx.resolved_line,
        issue.source_id,
        issue.issue_type().as_str()
    ));
    if let Some(confidence) = issue.confidence {
        out.push_str(&format!(" (confidence {:.2})", confidence));
    }
    if request.attempt > 1 {
        out.push_str(" (deferred)");
    }
    out.push('\n');

    for message in &issue.messages {
        out.push_str(&format!("  {}\n", message));
    }

    if !ctx.surrounding.is_empty() {
        out.push('\n');
        for line in &ctx.surrounding {
            let marker = if line.line == ctx.resolved_line { '>' } else { ' ' };
            out.push_str(&format!("{} {:>5} | {}\n", marker, line.line, line.text));
        }
    }

    out.push('\n');
    match &issue.kind {
        IssueKind::Insert { content } => {
            for line in content {
                out.push_str(&format!("+ {}\n", line));
            }
        }
        IssueKind::Delete => {
            if let Some(current) = &ctx.current {
                out.push_str(&format!("- {}\n", current));
            }
        }
        IssueKind::Replace { new_content } => {
            if let Some(current) = &ctx.current {
                out.push_str(&format!("- {}\n", current));
            }
            out.push_str(&format!("+ {}\n", new_content));
        }
    }

    out.push_str("\nApply? [y]es / [n]o / [d]efer, optionally followed by a note: ");
    out
}

pub fn render_run_md(report: &RunReport) -> String {
    let mut out = String::new();
    out.push_str("# docfix run\n\n");
    if report.dry_run {
        out.push_str("_Dry run: no files were modified._\n\n");
    }
    let t = &report.totals;
    out.push_str(&format!(
        "- Documents: {}\n- Issues: {}\n- Approved: {}\n- Rejected: {}\n- Skipped: {}\n- Aborted: {}\n- Partial: {}\n\n",
        t.documents, t.issues_seen, t.approved, t.rejected, t.skipped, t.aborted, t.partial
    ));

    out.push_str("## Sessions\n\n");
    if report.sessions.is_empty() {
        out.push_str("_No documents processed._\n");
        return out;
    }

    for (i, s) in report.sessions.iter().enumerate() {
        out.push_str(&format!("### {}. {}\n\n", i + 1, s.file_path));
        out.push_str(&format!("- State: `{}`\n", state_label(s.state)));
        out.push_str(&format!(
            "- Issues: {} (approved {}, rejected {}, stale {}, protected {})\n",
            s.issues_seen, s.approved, s.rejected, s.skipped_stale, s.skipped_protected
        ));
        if s.timed_out > 0 || s.deferred > 0 {
            out.push_str(&format!(
                "- Timed out: {}, deferred: {}\n",
                s.timed_out, s.deferred
            ));
        }
        out.push_str(&format!("- Lines: {} → {}\n", s.lines_before, s.lines_after));
        if let Some(v) = s.committed_version {
            out.push_str(&format!("- Committed version: {}\n", v));
        }
        if let Some(fatal) = &s.fatal {
            out.push_str(&format!(
                "- Fatal: `{}` {}\n",
                fatal_label(&fatal.kind),
                fatal.message
            ));
        }
        if s.unprocessed > 0 {
            out.push_str(&format!("- Unprocessed: {}\n", s.unprocessed));
        }
        if !s.detector_failures.is_empty() {
            out.push_str("\n**Detector failures**\n\n");
            for f in &s.detector_failures {
                out.push_str(&format!("- `{}`: {}\n", f.source_id, f.message));
            }
        }
        out.push('\n');
    }

    out
}

/// One line per session plus a totals line.
pub fn render_run_text(report: &RunReport) -> String {
    let mut out = String::new();
    for s in &report.sessions {
        out.push_str(&session_line(s));
        out.push('\n');
    }
    let t = &report.totals;
    out.push_str(&format!(
        "{} document(s): {} approved, {} rejected, {} skipped{}\n",
        t.documents,
        t.approved,
        t.rejected,
        t.skipped,
        if report.dry_run { " (dry run)" } else { "" }
    ));
    out
}

fn session_line(s: &SessionSummary) -> String {
    let mut line = format!(
        "{}: {} issue(s), {} approved, {} rejected, {} skipped",
        s.file_path,
        s.issues_seen,
        s.approved,
        s.rejected,
        s.skipped_stale + s.skipped_protected
    );
    if s.partial {
        line.push_str(&format!(
            " [partial: {} source(s) failed]",
            s.detector_failures.len()
        ));
    }
    if let Some(fatal) = &s.fatal {
        line.push_str(&format!(" [aborted: {}]", fatal.message));
    }
    line
}

pub fn render_stats_text(stats: &LogStats) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} session(s), {} file(s), {} decision(s)\n",
        stats.sessions, stats.files, stats.totals.total
    ));
    if stats.preview_records > 0 {
        out.push_str(&format!(
            "{} dry-run record(s) ignored\n",
            stats.preview_records
        ));
    }
    if stats.rows.is_empty() {
        return out;
    }

    out.push('\n');
    out.push_str(&format!(
        "{:<20} {:<8} {:>6} {:>8} {:>8} {:>8} {:>8}\n",
        "source", "type", "total", "approved", "rejected", "skipped", "rate"
    ));
    for row in &stats.rows {
        out.push_str(&stats_row(row));
    }
    out.push_str(&stats_row(&stats.totals));
    out
}

fn stats_row(row: &StatsRow) -> String {
    let rate = row
        .approval_rate()
        .map(|r| format!("{:.0}%", r * 100.0))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:<20} {:<8} {:>6} {:>8} {:>8} {:>8} {:>8}\n",
        row.source_id,
        row.issue_type.map(|t| t.as_str()).unwrap_or("*"),
        row.total,
        row.approved,
        row.rejected + row.timed_out + row.deferred_twice,
        row.skipped_stale + row.skipped_protected,
        rate
    )
}

fn state_label(state: SessionState) -> &'static str {
    match state {
        SessionState::Detecting => "detecting",
        SessionState::Merging => "merging",
        SessionState::Applying => "applying",
        SessionState::Finalizing => "finalizing",
        SessionState::Done => "done",
        SessionState::Aborted => "aborted",
    }
}

fn fatal_label(kind: &docfix_types::summary::FatalKind) -> &'static str {
    use docfix_types::summary::FatalKind;
    match kind {
        FatalKind::LockContention => "lock_contention",
        FatalKind::ReadFailure => "read_failure",
        FatalKind::PersistenceFailure => "persistence_failure",
        FatalKind::DecisionLogFailure => "decision_log_failure",
        FatalKind::ApprovalFailure => "approval_failure",
        FatalKind::InvalidEdit => "invalid_edit",
        FatalKind::Cancelled => "cancelled",
    }
}
