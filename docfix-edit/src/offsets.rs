//! Re-anchoring of issue line numbers across a session's applied edits.
//!
//! Every issue in a session is computed against the same base snapshot. The
//! tracker records each applied edit as a shift in base coordinates; the
//! current position of a base line is the base line plus the deltas of every
//! shift at or before it.

use crate::error::AnchorError;
use docfix_types::issue::IssueKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::trace;

/// `delta` applies to every base line `>= position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shift {
    pub position: usize,
    pub delta: isize,
}

#[derive(Debug, Clone)]
pub struct OffsetTracker {
    base_version: u64,
    base_len: usize,
    shifts: Vec<Shift>,
    deleted: BTreeSet<usize>,
}

impl OffsetTracker {
    /// Tracker for a session whose issues target `base_version`, a document of
    /// `base_len` lines.
    pub fn new(base_version: u64, base_len: usize) -> Self {
        Self {
            base_version,
            base_len,
            shifts: Vec::new(),
            deleted: BTreeSet::new(),
        }
    }

    pub fn base_version(&self) -> u64 {
        self.base_version
    }

    pub fn shifts(&self) -> &[Shift] {
        &self.shifts
    }

    pub fn is_deleted(&self, line: usize) -> bool {
        self.deleted.contains(&line)
    }

    /// Map a base-coordinate anchor into the current document.
    pub fn resolve(
        &self,
        line: usize,
        snapshot_version: u64,
        kind: &IssueKind,
    ) -> Result<usize, AnchorError> {
        if snapshot_version != self.base_version {
            return Err(AnchorError::VersionMismatch {
                expected: self.base_version,
                found: snapshot_version,
            });
        }

        let max = match kind {
            IssueKind::Insert { .. } => self.base_len + 1,
            IssueKind::Delete | IssueKind::Replace { .. } => self.base_len,
        };
        if line == 0 || line > max {
            return Err(AnchorError::OutOfRange { line, max });
        }

        // Inserts target the gap before a line, which survives the line itself.
        if !matches!(kind, IssueKind::Insert { .. }) && self.deleted.contains(&line) {
            return Err(AnchorError::Deleted { line });
        }

        let delta: isize = self
            .shifts
            .iter()
            .filter(|s| s.position <= line)
            .map(|s| s.delta)
            .sum();
        let current = line as isize + delta;
        if current < 1 {
            return Err(AnchorError::OutOfRange { line, max });
        }
        Ok(current as usize)
    }

    /// Record that `kind` was applied at base line `line`.
    pub fn record(&mut self, line: usize, kind: &IssueKind) {
        match kind {
            IssueKind::Insert { content } => {
                if !content.is_empty() {
                    self.shifts.push(Shift {
                        position: line,
                        delta: content.len() as isize,
                    });
                }
            }
            IssueKind::Delete => {
                self.shifts.push(Shift {
                    position: line + 1,
                    delta: -1,
                });
                self.deleted.insert(line);
            }
            IssueKind::Replace { .. } => {}
        }
        trace!(line, shifts = self.shifts.len(), "recorded shift");
    }
}
