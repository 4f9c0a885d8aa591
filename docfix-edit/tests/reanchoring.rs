use docfix_edit::{OffsetTracker, Snapshot, apply_decision};
use docfix_types::decision::{Decision, SkipReason};
use docfix_types::issue::{Issue, IssueDraft};
use pretty_assertions::assert_eq;

fn numbered(n: usize) -> Snapshot {
    let text: String = (1..=n).map(|i| format!("line {i}\n")).collect();
    Snapshot::from_text("doc.md", &text)
}

fn approve(snapshot: &Snapshot, issue: Issue, tracker: &mut OffsetTracker) -> Snapshot {
    let line = tracker
        .resolve(issue.anchor_line, issue.snapshot_version, &issue.kind)
        .expect("resolves");
    apply_decision(snapshot, &Decision::approved(issue, line), tracker).expect("applies")
}

#[test]
fn insert_then_delete_moves_replace_to_seven() {
    let base = numbered(10);
    let mut tracker = OffsetTracker::new(base.version(), base.len());

    let snap = approve(
        &base,
        IssueDraft::insert(3, vec!["x".to_string(), "y".to_string()]).into_issue("a", 1),
        &mut tracker,
    );
    let snap = approve(&snap, IssueDraft::delete(5).into_issue("a", 1), &mut tracker);

    let replace = IssueDraft::replace(6, "six").into_issue("b", 1);
    assert_eq!(
        tracker.resolve(replace.anchor_line, 1, &replace.kind),
        Ok(7)
    );
    let snap = approve(&snap, replace, &mut tracker);
    assert_eq!(snap.line(7), Some("six"));
    assert_eq!(snap.len(), 11);
    assert_eq!(snap.version(), 4);
}

#[test]
fn rejected_delete_leaves_replace_at_eight() {
    let base = numbered(10);
    let mut tracker = OffsetTracker::new(base.version(), base.len());

    let snap = approve(
        &base,
        IssueDraft::insert(3, vec!["x".to_string(), "y".to_string()]).into_issue("a", 1),
        &mut tracker,
    );
    let delete = IssueDraft::delete(5).into_issue("a", 1);
    let snap = apply_decision(
        &snap,
        &Decision::rejected(delete, SkipReason::Rejected, Some(7)),
        &mut tracker,
    )
    .expect("rejection is a no-op");

    let replace = IssueDraft::replace(6, "six").into_issue("b", 1);
    let snap = approve(&snap, replace, &mut tracker);
    assert_eq!(snap.line(8), Some("six"));
    assert_eq!(snap.line(7), Some("line 5"));
}

#[test]
fn two_sources_merge_into_one_document() {
    let base = Snapshot::from_text("doc.md", "A\nB\nC\n");
    let mut tracker = OffsetTracker::new(base.version(), base.len());

    // Source order first, then anchor order within a source.
    let queue = vec![
        IssueDraft::replace(2, "B2").into_issue("first", 1),
        IssueDraft::delete(1).into_issue("second", 1),
        IssueDraft::insert(3, vec!["X".to_string()]).into_issue("second", 1),
    ];

    let mut snap = base;
    for issue in queue {
        snap = approve(&snap, issue, &mut tracker);
    }
    assert_eq!(snap.render(), "B2\nX\nC\n");
}

#[test]
fn edit_on_deleted_line_is_stale() {
    let base = numbered(3);
    let mut tracker = OffsetTracker::new(base.version(), base.len());
    let snap = approve(&base, IssueDraft::delete(2).into_issue("a", 1), &mut tracker);

    let replace = IssueDraft::replace(2, "gone").into_issue("b", 1);
    let err = apply_decision(&snap, &Decision::approved(replace, 2), &mut tracker)
        .expect_err("stale");
    assert_eq!(err.skip_reason(), Some(SkipReason::StaleAnchor));
}

#[test]
fn crlf_is_preserved_through_edits() {
    let base = Snapshot::from_text("doc.md", "a\r\nb\r\n");
    let mut tracker = OffsetTracker::new(base.version(), base.len());
    let snap = approve(
        &base,
        IssueDraft::insert(2, vec!["mid".to_string()]).into_issue("a", 1),
        &mut tracker,
    );
    assert_eq!(snap.render(), "a\r\nmid\r\nb\r\n");
}
