//! One document, start to finish.
//!
//! A session walks `Detecting → Merging → Applying → Finalizing → Done`.
//! Every issue that reaches Applying gets exactly one decision record, and
//! that record is written before the edit is applied. The document on disk
//! only ever holds the original bytes or a fully written later version.

use crate::approval::ApprovalGate;
use crate::cancel::CancelToken;
use crate::detect::detect_all;
use crate::error::SessionError;
use crate::lock::DocumentLock;
use crate::ports::{DecisionSink, DocumentStore};
use crate::settings::{PersistMode, SessionSettings};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use docfix_domain::{DetectionCache, SourceSpec, is_mdx, merge_issues, mdx_protected_ranges};
use docfix_edit::{OffsetTracker, Snapshot, apply_decision, render_patch};
use docfix_types::decision::{Decision, SkipReason};
use docfix_types::issue::{Issue, IssueKind};
use docfix_types::record::{DecisionRecord, RecordMode};
use docfix_types::review::{ContextLine, ReviewContext, ReviewRequest, Verdict};
use docfix_types::summary::{SessionState, SessionSummary};
use std::collections::VecDeque;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Shared collaborators for every session in a run.
pub struct SessionContext<'a> {
    pub store: &'a dyn DocumentStore,
    /// Committed decision log.
    pub log: &'a dyn DecisionSink,
    /// Receives dry-run records. Dry runs without one record nothing.
    pub preview: Option<&'a dyn DecisionSink>,
    pub cache: &'a DetectionCache,
    pub cancel: CancelToken,
}

#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub summary: SessionSummary,
    /// Unified diff from the original document to what was committed, or to
    /// the shadow copy in a dry run. Empty when nothing changed.
    pub patch: String,
}

pub struct Session<'a> {
    id: String,
    path: Utf8PathBuf,
    sources: &'a [SourceSpec],
    settings: &'a SessionSettings,
    ctx: &'a SessionContext<'a>,
}

struct Pending {
    issue: Issue,
    attempt: u32,
}

/// Mutable state of the Applying phase.
struct Applying {
    queue: VecDeque<Pending>,
    tracker: OffsetTracker,
    current: Snapshot,
    /// Snapshot the issues were detected against.
    base: Snapshot,
}

/// Document text at the three points the outcome reports on.
#[derive(Default)]
struct Texts {
    original: String,
    committed: String,
    shadow: String,
}

impl<'a> Session<'a> {
    pub fn new(
        path: impl Into<Utf8PathBuf>,
        sources: &'a [SourceSpec],
        settings: &'a SessionSettings,
        ctx: &'a SessionContext<'a>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            path: path.into(),
            sources,
            settings,
            ctx,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Run to completion. Fatal conditions end in an `aborted` summary rather
    /// than an error.
    pub fn run(self, gate: &mut dyn ApprovalGate) -> SessionOutcome {
        let mut summary = SessionSummary::new(
            self.id.clone(),
            self.path.to_string(),
            self.settings.dry_run,
        );
        let mut texts = Texts::default();

        match self.drive(gate, &mut summary, &mut texts) {
            Ok(()) => {
                summary.state = SessionState::Done;
                info!(
                    path = %self.path,
                    approved = summary.approved,
                    rejected = summary.rejected,
                    skipped = summary.skipped_stale + summary.skipped_protected,
                    dry_run = self.settings.dry_run,
                    "session finished"
                );
            }
            Err(e) => {
                warn!(path = %self.path, state = ?summary.state, error = %e, "session aborted");
                summary.state = SessionState::Aborted;
                summary.aborted = true;
                summary.fatal = Some(e.to_cause());
            }
        }
        summary.ended_at = Some(Utc::now());

        let after = if self.settings.dry_run {
            &texts.shadow
        } else {
            &texts.committed
        };
        let patch = render_patch(self.path.as_str(), &texts.original, after);
        SessionOutcome { summary, patch }
    }

    fn drive(
        &self,
        gate: &mut dyn ApprovalGate,
        summary: &mut SessionSummary,
        texts: &mut Texts,
    ) -> Result<(), SessionError> {
        let read_err = |source| SessionError::Read {
            path: self.path.clone(),
            source,
        };
        let canonical = self.ctx.store.canonicalize(&self.path).map_err(read_err)?;
        let sidecar = self.ctx.store.lock_path(&canonical);
        let _lock = DocumentLock::try_acquire(&canonical, sidecar.as_deref())
            .map_err(|e| SessionError::Read {
                path: self.path.clone(),
                source: anyhow::Error::new(e).context("open lock file"),
            })?
            .ok_or_else(|| SessionError::LockContention {
                path: self.path.clone(),
            })?;

        let text = self.ctx.store.read(&self.path).map_err(read_err)?;
        let mut snapshot = Snapshot::from_text(self.path.clone(), &text);
        if self.settings.protect_mdx && is_mdx(&self.path) {
            let ranges = mdx_protected_ranges(snapshot.lines());
            debug!(path = %self.path, ranges = ranges.len(), "protected mdx regions");
            snapshot = snapshot.with_protected(ranges);
        }
        texts.original = text.clone();
        texts.committed = text.clone();
        texts.shadow = text;
        summary.lines_before = snapshot.len() as u64;
        summary.lines_after = snapshot.len() as u64;

        summary.state = SessionState::Detecting;
        let workers = self.settings.workers(self.sources.len());
        let detection = detect_all(
            self.sources,
            &snapshot,
            self.ctx.cache,
            workers,
            self.settings.detector_timeout,
            &self.ctx.cancel,
        )?;
        summary.partial = !detection.failures.is_empty();
        summary.detector_failures = detection.failures;

        summary.state = SessionState::Merging;
        let issues = merge_issues(detection.per_source);
        summary.issues_seen = issues.len() as u64;
        debug!(path = %self.path, issues = issues.len(), "merged issues");

        summary.state = SessionState::Applying;
        let mut work = Applying {
            queue: issues
                .into_iter()
                .map(|issue| Pending { issue, attempt: 1 })
                .collect(),
            tracker: OffsetTracker::new(snapshot.version(), snapshot.len()),
            current: snapshot.clone(),
            base: snapshot,
        };

        while let Some(pending) = work.queue.pop_front() {
            let decided = summary.decisions();
            let step = if self.ctx.cancel.is_cancelled() {
                Err(SessionError::Cancelled)
            } else {
                self.process(pending, &mut work, gate, summary, texts)
            };
            if let Err(e) = step {
                let in_flight = u64::from(summary.decisions() == decided);
                summary.unprocessed = work.queue.len() as u64 + in_flight;
                return Err(e);
            }
        }

        summary.state = SessionState::Finalizing;
        if self.settings.dry_run {
            texts.shadow = work.current.render();
            summary.lines_after = work.current.len() as u64;
        } else {
            self.commit(&work.current, summary, texts)?;
        }
        Ok(())
    }

    /// Offer one issue: re-anchor, check protection, ask the gate, log, apply.
    fn process(
        &self,
        pending: Pending,
        work: &mut Applying,
        gate: &mut dyn ApprovalGate,
        summary: &mut SessionSummary,
        texts: &mut Texts,
    ) -> Result<(), SessionError> {
        let Pending { issue, attempt } = pending;
        let deferred = attempt > 1;
        let current = &work.current;

        let decision = match work.tracker.resolve(issue.anchor_line, issue.snapshot_version, &issue.kind) {
            Err(e) => {
                debug!(source = %issue.source_id, anchor = issue.anchor_line, error = %e, "stale anchor");
                Decision::rejected(issue, SkipReason::StaleAnchor, None)
            }
            Ok(line) if touches_protected(current, line, &issue.kind) => {
                debug!(source = %issue.source_id, line, "protected line");
                Decision::rejected(issue, SkipReason::ProtectedRegionViolation, Some(line))
            }
            Ok(line) => {
                let request = self.review_request(&issue, line, current, attempt);
                let started = Instant::now();
                let response = gate.decide(&request).map_err(SessionError::Approval)?;
                let latency_ms = started.elapsed().as_millis() as u64;

                let decision = match response.verdict {
                    Verdict::Approve => Decision::approved(issue, line),
                    Verdict::Reject => Decision::rejected(issue, SkipReason::Rejected, Some(line)),
                    Verdict::TimedOut => {
                        Decision::rejected(issue, SkipReason::ApprovalTimeout, Some(line))
                    }
                    Verdict::Defer if !deferred => {
                        debug!(source = %issue.source_id, line, "deferred");
                        summary.deferred += 1;
                        work.queue.push_back(Pending { issue, attempt: 2 });
                        return Ok(());
                    }
                    Verdict::Defer => {
                        Decision::rejected(issue, SkipReason::DeferredTwice, Some(line))
                    }
                };
                decision
                    .with_explanation(response.explanation)
                    .with_latency_ms(latency_ms)
            }
        }
        .with_deferred(deferred);

        self.record(&decision, current, &work.base)?;
        count(summary, &decision);

        if decision.approved {
            work.current = apply_decision(&work.current, &decision, &mut work.tracker)
                .map_err(SessionError::Edit)?;
            if self.settings.persist == PersistMode::PerIssue && !self.settings.dry_run {
                self.commit(&work.current, summary, texts)?;
            }
        }
        Ok(())
    }

    fn review_request(
        &self,
        issue: &Issue,
        line: usize,
        current: &Snapshot,
        attempt: u32,
    ) -> ReviewRequest {
        let context = ReviewContext {
            resolved_line: line,
            current: current.line(line).map(str::to_string),
            proposed: issue.kind.proposed_text(),
            surrounding: current
                .window(line, self.settings.context_radius)
                .into_iter()
                .map(|(line, text)| ContextLine {
                    line,
                    text: text.to_string(),
                })
                .collect(),
        };
        let mut request = ReviewRequest::new(
            Uuid::new_v4().to_string(),
            self.path.to_string(),
            issue.clone(),
            context,
        );
        request.attempt = attempt;
        request
    }

    fn record(
        &self,
        decision: &Decision,
        current: &Snapshot,
        base: &Snapshot,
    ) -> Result<(), SessionError> {
        // Stale issues have no current line; fall back to the text they were
        // detected against.
        let original = match decision.resolved_line {
            Some(line) => current.line(line),
            None if decision.issue.snapshot_version == base.version() => {
                base.line(decision.issue.anchor_line)
            }
            None => None,
        }
        .map(str::to_string);
        let (mode, sink) = if self.settings.dry_run {
            (RecordMode::Preview, self.ctx.preview)
        } else {
            (RecordMode::Commit, Some(self.ctx.log))
        };
        let Some(sink) = sink else {
            return Ok(());
        };

        let record = DecisionRecord::from_decision(
            &self.id,
            mode,
            self.path.as_str(),
            decision,
            original,
        );
        sink.append(&record).map_err(SessionError::DecisionLog)
    }

    fn commit(
        &self,
        snapshot: &Snapshot,
        summary: &mut SessionSummary,
        texts: &mut Texts,
    ) -> Result<(), SessionError> {
        let rendered = snapshot.render();
        if rendered == texts.committed {
            return Ok(());
        }
        self.ctx
            .store
            .write(&self.path, &rendered)
            .map_err(|source| SessionError::Persist {
                path: self.path.clone(),
                source,
            })?;
        debug!(path = %self.path, version = snapshot.version(), "committed document");
        texts.committed = rendered;
        summary.committed_version = Some(snapshot.version());
        summary.lines_after = snapshot.len() as u64;
        Ok(())
    }
}

fn touches_protected(snapshot: &Snapshot, line: usize, kind: &IssueKind) -> bool {
    match kind {
        // Appending past the last line never lands inside a region.
        IssueKind::Insert { .. } => line <= snapshot.len() && snapshot.is_protected(line),
        IssueKind::Delete | IssueKind::Replace { .. } => snapshot.is_protected(line),
    }
}

fn count(summary: &mut SessionSummary, decision: &Decision) {
    if decision.approved {
        summary.approved += 1;
        return;
    }
    match decision.reason {
        Some(SkipReason::StaleAnchor) => summary.skipped_stale += 1,
        Some(SkipReason::ProtectedRegionViolation) => summary.skipped_protected += 1,
        Some(SkipReason::ApprovalTimeout) => {
            summary.rejected += 1;
            summary.timed_out += 1;
        }
        Some(SkipReason::DeferredTwice) | Some(SkipReason::Rejected) | None => {
            summary.rejected += 1
        }
    }
}
