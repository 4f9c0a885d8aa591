use crate::error::{EditError, EditResult};
use crate::offsets::OffsetTracker;
use crate::snapshot::Snapshot;
use docfix_types::decision::Decision;
use docfix_types::issue::IssueKind;
use tracing::debug;

/// Apply one decision to `snapshot`, returning the next snapshot.
///
/// Rejected decisions return an unchanged clone. Approved decisions are
/// re-anchored through `tracker`, refused when they touch a protected line,
/// applied in memory, and recorded in `tracker`. Nothing is written to disk.
pub fn apply_decision(
    snapshot: &Snapshot,
    decision: &Decision,
    tracker: &mut OffsetTracker,
) -> EditResult<Snapshot> {
    if !decision.approved {
        return Ok(snapshot.clone());
    }

    let issue = &decision.issue;
    let line = tracker.resolve(issue.anchor_line, issue.snapshot_version, &issue.kind)?;
    validate_content(line, &issue.kind)?;

    let touches_protected = match &issue.kind {
        IssueKind::Insert { .. } => line <= snapshot.len() && snapshot.is_protected(line),
        IssueKind::Delete | IssueKind::Replace { .. } => snapshot.is_protected(line),
    };
    if touches_protected {
        return Err(EditError::Protected { line });
    }

    let next = match &issue.kind {
        IssueKind::Insert { content } => snapshot.with_inserted(line, content),
        IssueKind::Delete => snapshot.with_deleted(line),
        IssueKind::Replace { new_content } => snapshot.with_replaced(line, new_content),
    };
    tracker.record(issue.anchor_line, &issue.kind);

    debug!(
        source = %issue.source_id,
        kind = issue.issue_type().as_str(),
        anchor = issue.anchor_line,
        line,
        version = next.version(),
        "applied edit"
    );
    Ok(next)
}

fn validate_content(line: usize, kind: &IssueKind) -> EditResult<()> {
    let has_break = |s: &str| s.contains('\n') || s.contains('\r');
    match kind {
        IssueKind::Insert { content } if content.is_empty() => Err(EditError::InvalidContent {
            line,
            message: "insertion has no lines".to_string(),
        }),
        IssueKind::Insert { content } if content.iter().any(|l| has_break(l)) => {
            Err(EditError::InvalidContent {
                line,
                message: "inserted line contains a line break".to_string(),
            })
        }
        IssueKind::Replace { new_content } if has_break(new_content) => {
            Err(EditError::InvalidContent {
                line,
                message: "replacement contains a line break".to_string(),
            })
        }
        _ => Ok(()),
    }
}
