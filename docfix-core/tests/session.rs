use camino::Utf8Path;
use docfix_core::adapters::{InMemoryDecisionSink, InMemoryDocumentStore};
use docfix_core::lock::DocumentLock;
use docfix_core::{
    ApprovalGate, CancelToken, ChannelSurface, DelegatedGate, DetectionCache, PersistMode,
    RuleSource, Session, SessionContext, SessionOutcome, SessionSettings, SilentGate, SourceSpec,
};
use docfix_types::decision::SkipReason;
use docfix_types::issue::IssueDraft;
use docfix_types::record::RecordMode;
use docfix_types::review::{GateResponse, ReviewRequest};
use docfix_types::summary::{FatalKind, SessionState};
use pretty_assertions::assert_eq;
use std::collections::VecDeque;
use std::time::Duration;

struct Harness {
    store: InMemoryDocumentStore,
    log: InMemoryDecisionSink,
    preview: InMemoryDecisionSink,
    cache: DetectionCache,
    cancel: CancelToken,
}

impl Harness {
    fn new(path: &str, text: &str) -> Self {
        Self {
            store: InMemoryDocumentStore::new().with_file(path, text),
            log: InMemoryDecisionSink::new(),
            preview: InMemoryDecisionSink::new(),
            cache: DetectionCache::in_memory(),
            cancel: CancelToken::new(),
        }
    }

    fn run(
        &self,
        path: &str,
        sources: &[SourceSpec],
        gate: &mut dyn ApprovalGate,
        settings: &SessionSettings,
    ) -> SessionOutcome {
        let ctx = SessionContext {
            store: &self.store,
            log: &self.log,
            preview: Some(&self.preview),
            cache: &self.cache,
            cancel: self.cancel.clone(),
        };
        Session::new(path, sources, settings, &ctx).run(gate)
    }

    fn content(&self, path: &str) -> String {
        self.store.get(Utf8Path::new(path)).expect("document exists")
    }
}

fn fixed(name: &str, issues: Vec<IssueDraft>) -> SourceSpec {
    SourceSpec::new(name, RuleSource::Static { issues })
}

/// Replays a fixed list of answers, rejecting once it runs out.
#[derive(Default)]
struct Scripted {
    answers: VecDeque<GateResponse>,
    seen: Vec<ReviewRequest>,
}

impl Scripted {
    fn new(answers: impl IntoIterator<Item = GateResponse>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            seen: vec![],
        }
    }
}

impl ApprovalGate for Scripted {
    fn decide(&mut self, request: &ReviewRequest) -> anyhow::Result<GateResponse> {
        self.seen.push(request.clone());
        Ok(self.answers.pop_front().unwrap_or_else(GateResponse::reject))
    }
}

fn ten_lines() -> String {
    (1..=10).map(|i| format!("l{i}\n")).collect()
}

fn reanchoring_sources() -> Vec<SourceSpec> {
    vec![
        fixed(
            "structure",
            vec![
                IssueDraft::delete(5),
                IssueDraft::insert(3, vec!["n1".into(), "n2".into()]),
            ],
        ),
        fixed("terms", vec![IssueDraft::replace(6, "R")]),
    ]
}

#[test]
fn replace_moves_by_insert_and_delete() {
    let h = Harness::new("reanchor-both.md", &ten_lines());
    let outcome = h.run(
        "reanchor-both.md",
        &reanchoring_sources(),
        &mut SilentGate::ApproveAll,
        &SessionSettings::default(),
    );

    assert_eq!(outcome.summary.state, SessionState::Done);
    assert_eq!(outcome.summary.approved, 3);
    let lines: Vec<String> = h.content("reanchor-both.md").lines().map(String::from).collect();
    assert_eq!(lines.len(), 11);
    assert_eq!(lines[6], "R");

    let replace = h
        .log
        .records()
        .into_iter()
        .find(|r| r.source_id == "terms")
        .expect("replace record");
    assert_eq!(replace.anchor_line, 6);
    assert_eq!(replace.resolved_line, Some(7));
    assert_eq!(replace.original_content.as_deref(), Some("l6"));
}

#[test]
fn replace_moves_by_insert_only_when_delete_rejected() {
    let h = Harness::new("reanchor-insert.md", &ten_lines());
    // Merged order: insert(3), delete(5), replace(6).
    let mut gate = Scripted::new([
        GateResponse::approve(),
        GateResponse::reject(),
        GateResponse::approve(),
    ]);
    let outcome = h.run(
        "reanchor-insert.md",
        &reanchoring_sources(),
        &mut gate,
        &SessionSettings::default(),
    );

    assert_eq!(outcome.summary.approved, 2);
    assert_eq!(outcome.summary.rejected, 1);
    let lines: Vec<String> = h.content("reanchor-insert.md").lines().map(String::from).collect();
    assert_eq!(lines[7], "R");
    assert_eq!(gate.seen[2].context.resolved_line, 8);
}

#[test]
fn sources_apply_in_configured_order() {
    let h = Harness::new("scenario.md", "A\nB\nC\n");
    let sources = vec![
        fixed("one", vec![IssueDraft::replace(2, "B2")]),
        fixed(
            "two",
            vec![IssueDraft::insert(3, vec!["X".into()]), IssueDraft::delete(1)],
        ),
    ];
    let outcome = h.run(
        "scenario.md",
        &sources,
        &mut SilentGate::ApproveAll,
        &SessionSettings::default(),
    );

    assert_eq!(h.content("scenario.md"), "B2\nX\nC\n");
    assert_eq!(outcome.summary.committed_version, Some(4));
    assert_eq!(outcome.summary.lines_before, 3);
    assert_eq!(outcome.summary.lines_after, 3);
    let order: Vec<(String, usize)> = h
        .log
        .records()
        .into_iter()
        .map(|r| (r.source_id, r.anchor_line))
        .collect();
    assert_eq!(
        order,
        vec![("one".into(), 2), ("two".into(), 1), ("two".into(), 3)]
    );
    assert!(outcome.patch.contains("-A\n"));
    assert!(outcome.patch.contains("+X\n"));
}

#[test]
fn dry_run_touches_neither_document_nor_log() {
    let h = Harness::new("dry.md", "keep \nme\n");
    let sources = vec![SourceSpec::new("ws", RuleSource::TrailingWhitespace)];
    let settings = SessionSettings {
        dry_run: true,
        ..SessionSettings::default()
    };
    let outcome = h.run("dry.md", &sources, &mut SilentGate::ApproveAll, &settings);

    assert_eq!(h.content("dry.md"), "keep \nme\n");
    assert_eq!(h.store.writes(), 0);
    assert!(h.log.is_empty());

    let previews = h.preview.records();
    assert_eq!(previews.len(), 1);
    assert_eq!(previews[0].mode, RecordMode::Preview);
    assert!(outcome.summary.dry_run);
    assert_eq!(outcome.summary.committed_version, None);
    assert!(outcome.patch.contains("-keep \n+keep\n"));
}

#[test]
fn second_session_on_a_locked_document_is_refused() {
    let h = Harness::new("locked.md", "x \n");
    let _held = DocumentLock::try_acquire(Utf8Path::new("locked.md"), None)
        .expect("no io")
        .expect("lock");
    let sources = vec![SourceSpec::new("ws", RuleSource::TrailingWhitespace)];

    let outcome = h.run(
        "locked.md",
        &sources,
        &mut SilentGate::ApproveAll,
        &SessionSettings::default(),
    );

    let summary = outcome.summary;
    assert!(summary.aborted);
    assert_eq!(summary.state, SessionState::Aborted);
    assert_eq!(summary.fatal.expect("fatal").kind, FatalKind::LockContention);
    assert_eq!(h.content("locked.md"), "x \n");
    assert!(h.log.is_empty());
}

#[test]
fn every_issue_gets_exactly_one_record() {
    let h = Harness::new("records.md", "a\nb\nc\nd\n");
    let sources = vec![
        fixed("first", vec![IssueDraft::delete(2), IssueDraft::replace(3, "C")]),
        // Line 2 is gone by the time these are offered.
        fixed("second", vec![IssueDraft::replace(2, "B"), IssueDraft::delete(4)]),
    ];
    let mut gate = Scripted::new([
        GateResponse::approve(),
        GateResponse::reject().with_explanation("keep c"),
        GateResponse::approve(),
    ]);
    let outcome = h.run("records.md", &sources, &mut gate, &SessionSettings::default());

    let summary = &outcome.summary;
    assert_eq!(summary.issues_seen, 4);
    assert_eq!(h.log.len() as u64, summary.issues_seen);
    assert_eq!(summary.decisions(), summary.issues_seen);
    assert_eq!(summary.skipped_stale, 1);
    assert_eq!(gate.seen.len(), 3);

    let records = h.log.records();
    let stale = records
        .iter()
        .find(|r| r.reason == Some(SkipReason::StaleAnchor))
        .expect("stale record");
    assert_eq!(stale.source_id, "second");
    assert_eq!(stale.resolved_line, None);
    // The text the issue was raised against, from the detected snapshot.
    assert_eq!(stale.original_content.as_deref(), Some("b"));
    let rejected = records
        .iter()
        .find(|r| r.reason == Some(SkipReason::Rejected))
        .expect("rejected record");
    assert_eq!(rejected.explanation.as_deref(), Some("keep c"));
    assert_eq!(h.content("records.md"), "a\nc\n");
}

#[test]
fn protected_lines_are_skipped_even_when_everything_is_approved() {
    let text = "import X from './x'\n\n<Note>\ntext \n</Note>\nplain \n";
    let h = Harness::new("page.mdx", text);
    let sources = vec![
        fixed("edit", vec![IssueDraft::replace(1, "import Y from './y'")]),
        SourceSpec::new("ws", RuleSource::TrailingWhitespace),
    ];
    let outcome = h.run(
        "page.mdx",
        &sources,
        &mut SilentGate::ApproveAll,
        &SessionSettings::default(),
    );

    assert_eq!(outcome.summary.skipped_protected, 2);
    assert_eq!(outcome.summary.approved, 1);
    assert_eq!(
        h.content("page.mdx"),
        "import X from './x'\n\n<Note>\ntext \n</Note>\nplain\n"
    );
    assert!(
        h.log
            .records()
            .iter()
            .filter(|r| !r.approved)
            .all(|r| r.reason == Some(SkipReason::ProtectedRegionViolation))
    );
}

#[test]
fn protection_can_be_switched_off() {
    let h = Harness::new("open.mdx", "import X from './x' \n");
    let sources = vec![SourceSpec::new("ws", RuleSource::TrailingWhitespace)];
    let settings = SessionSettings {
        protect_mdx: false,
        ..SessionSettings::default()
    };
    h.run("open.mdx", &sources, &mut SilentGate::ApproveAll, &settings);
    assert_eq!(h.content("open.mdx"), "import X from './x'\n");
}

#[test]
fn failed_write_keeps_original_document() {
    let h = Harness::new("readonly.md", "x \ny \n");
    h.store.fail_writes(true);
    let sources = vec![SourceSpec::new("ws", RuleSource::TrailingWhitespace)];
    let outcome = h.run(
        "readonly.md",
        &sources,
        &mut SilentGate::ApproveAll,
        &SessionSettings::default(),
    );

    let summary = &outcome.summary;
    assert!(summary.aborted);
    assert_eq!(
        summary.fatal.as_ref().expect("fatal").kind,
        FatalKind::PersistenceFailure
    );
    assert_eq!(summary.committed_version, None);
    assert_eq!(summary.unprocessed, 0);
    assert_eq!(h.content("readonly.md"), "x \ny \n");
    // Decisions were logged before the write was attempted.
    assert_eq!(h.log.len(), 2);
    assert!(outcome.patch.is_empty());
}

#[test]
fn failing_source_marks_session_partial() {
    let h = Harness::new("partial.md", "a \n");
    let sources = vec![
        fixed("broken", vec![IssueDraft::delete(40)]),
        SourceSpec::new("ws", RuleSource::TrailingWhitespace),
    ];
    let outcome = h.run(
        "partial.md",
        &sources,
        &mut SilentGate::ApproveAll,
        &SessionSettings::default(),
    );

    let summary = &outcome.summary;
    assert_eq!(summary.state, SessionState::Done);
    assert!(summary.partial);
    assert!(!summary.aborted);
    assert_eq!(summary.detector_failures.len(), 1);
    assert_eq!(summary.detector_failures[0].source_id, "broken");
    assert_eq!(h.content("partial.md"), "a\n");
}

#[test]
fn deferral_requeues_once_then_rejects() {
    let h = Harness::new("defer.md", "a \nb \n");
    let sources = vec![SourceSpec::new("ws", RuleSource::TrailingWhitespace)];
    // line 1: defer, line 2: approve, line 1 again: defer -> deferred_twice
    let mut gate = Scripted::new([
        GateResponse::defer(),
        GateResponse::approve(),
        GateResponse::defer(),
    ]);
    let outcome = h.run("defer.md", &sources, &mut gate, &SessionSettings::default());

    assert_eq!(gate.seen.len(), 3);
    assert_eq!(gate.seen[2].attempt, 2);
    assert_eq!(gate.seen[2].issue.anchor_line, 1);
    assert_eq!(outcome.summary.deferred, 1);
    assert_eq!(outcome.summary.rejected, 1);

    let records = h.log.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].anchor_line, 1);
    assert_eq!(records[1].reason, Some(SkipReason::DeferredTwice));
    assert!(records[1].deferred);
    assert!(!records[0].deferred);
    assert_eq!(h.content("defer.md"), "a \nb\n");
}

#[test]
fn deferred_issue_can_be_approved_later() {
    let h = Harness::new("defer-ok.md", "a \nb \n");
    let sources = vec![SourceSpec::new("ws", RuleSource::TrailingWhitespace)];
    let mut gate = Scripted::new([
        GateResponse::defer(),
        GateResponse::approve(),
        GateResponse::approve(),
    ]);
    h.run("defer-ok.md", &sources, &mut gate, &SessionSettings::default());

    assert_eq!(h.content("defer-ok.md"), "a\nb\n");
    let records = h.log.records();
    assert!(records[1].approved);
    assert!(records[1].deferred);
}

#[test]
fn delegated_review_without_answer_times_out() {
    let h = Harness::new("timeout.md", "a \n");
    let sources = vec![SourceSpec::new("ws", RuleSource::TrailingWhitespace)];
    let (surface, _tickets) = ChannelSurface::new();
    let mut gate = DelegatedGate::new(surface, Duration::from_millis(20));
    let outcome = h.run("timeout.md", &sources, &mut gate, &SessionSettings::default());

    assert_eq!(outcome.summary.timed_out, 1);
    assert_eq!(outcome.summary.rejected, 1);
    assert_eq!(h.log.records()[0].reason, Some(SkipReason::ApprovalTimeout));
    assert_eq!(h.content("timeout.md"), "a \n");
}

/// Approves, and cancels the session on the first offer.
struct CancelOnFirst(CancelToken);

impl ApprovalGate for CancelOnFirst {
    fn decide(&mut self, _request: &ReviewRequest) -> anyhow::Result<GateResponse> {
        self.0.cancel();
        Ok(GateResponse::approve())
    }
}

#[test]
fn cancellation_finishes_current_decision_then_stops() {
    let h = Harness::new("cancel.md", "a \nb \nc \n");
    let sources = vec![SourceSpec::new("ws", RuleSource::TrailingWhitespace)];
    let mut gate = CancelOnFirst(h.cancel.clone());
    let outcome = h.run("cancel.md", &sources, &mut gate, &SessionSettings::default());

    let summary = &outcome.summary;
    assert!(summary.aborted);
    assert_eq!(summary.fatal.as_ref().expect("fatal").kind, FatalKind::Cancelled);
    assert_eq!(summary.approved, 1);
    assert_eq!(summary.unprocessed, 2);
    assert_eq!(h.log.len(), 1);
    // End-of-session persistence never ran.
    assert_eq!(h.content("cancel.md"), "a \nb \nc \n");
}

#[test]
fn per_issue_persistence_commits_each_approval() {
    let h = Harness::new("each.md", "a \nb \nc \n");
    let sources = vec![SourceSpec::new("ws", RuleSource::TrailingWhitespace)];
    let mut gate = CancelOnFirst(h.cancel.clone());
    let settings = SessionSettings {
        persist: PersistMode::PerIssue,
        ..SessionSettings::default()
    };
    let outcome = h.run("each.md", &sources, &mut gate, &settings);

    // The first approval reached disk before the cancellation took effect.
    assert_eq!(h.content("each.md"), "a\nb \nc \n");
    assert_eq!(h.store.writes(), 1);
    assert_eq!(outcome.summary.committed_version, Some(2));
}

#[test]
fn log_failure_aborts_before_anything_is_applied() {
    let h = Harness::new("nolog.md", "a \nb \n");
    h.log.fail_appends(true);
    let sources = vec![SourceSpec::new("ws", RuleSource::TrailingWhitespace)];
    let outcome = h.run(
        "nolog.md",
        &sources,
        &mut SilentGate::ApproveAll,
        &SessionSettings::default(),
    );

    let summary = &outcome.summary;
    assert_eq!(
        summary.fatal.as_ref().expect("fatal").kind,
        FatalKind::DecisionLogFailure
    );
    assert_eq!(summary.unprocessed, 2);
    assert_eq!(summary.approved, 0);
    assert_eq!(h.content("nolog.md"), "a \nb \n");
    assert_eq!(h.store.writes(), 0);
}

struct Broken;

impl ApprovalGate for Broken {
    fn decide(&mut self, _request: &ReviewRequest) -> anyhow::Result<GateResponse> {
        anyhow::bail!("terminal closed")
    }
}

#[test]
fn gate_failure_is_fatal() {
    let h = Harness::new("broken-gate.md", "a \n");
    let sources = vec![SourceSpec::new("ws", RuleSource::TrailingWhitespace)];
    let outcome = h.run(
        "broken-gate.md",
        &sources,
        &mut Broken,
        &SessionSettings::default(),
    );

    let fatal = outcome.summary.fatal.expect("fatal");
    assert_eq!(fatal.kind, FatalKind::ApprovalFailure);
    assert!(fatal.message.contains("terminal closed"));
    assert!(h.log.is_empty());
}

#[test]
fn missing_document_is_a_read_failure() {
    let h = Harness::new("present.md", "a\n");
    let outcome = h.run(
        "absent.md",
        &[],
        &mut SilentGate::ApproveAll,
        &SessionSettings::default(),
    );
    assert_eq!(
        outcome.summary.fatal.expect("fatal").kind,
        FatalKind::ReadFailure
    );
}
