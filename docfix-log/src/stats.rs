//! Approval statistics over committed decisions.

use docfix_types::decision::SkipReason;
use docfix_types::issue::IssueType;
use docfix_types::record::{DecisionRecord, RecordMode};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsRow {
    pub source_id: String,
    pub issue_type: Option<IssueType>,
    pub total: u64,
    pub approved: u64,
    pub rejected: u64,
    pub timed_out: u64,
    pub deferred_twice: u64,
    pub skipped_stale: u64,
    pub skipped_protected: u64,
}

impl StatsRow {
    fn add(&mut self, record: &DecisionRecord) {
        self.total += 1;
        if record.approved {
            self.approved += 1;
            return;
        }
        match record.reason {
            Some(SkipReason::StaleAnchor) => self.skipped_stale += 1,
            Some(SkipReason::ProtectedRegionViolation) => self.skipped_protected += 1,
            Some(SkipReason::ApprovalTimeout) => self.timed_out += 1,
            Some(SkipReason::DeferredTwice) => self.deferred_twice += 1,
            Some(SkipReason::Rejected) | None => self.rejected += 1,
        }
    }

    /// Share of decisions the reviewer actually saw that were approved.
    pub fn approval_rate(&self) -> Option<f64> {
        let reviewed = self.approved + self.rejected + self.timed_out + self.deferred_twice;
        (reviewed > 0).then(|| self.approved as f64 / reviewed as f64)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LogStats {
    pub sessions: u64,
    pub files: u64,
    /// One row per (source, issue type), sorted.
    pub rows: Vec<StatsRow>,
    pub totals: StatsRow,
    /// Dry-run records present in the input but excluded from the numbers.
    pub preview_records: u64,
}

pub fn summarize(records: &[DecisionRecord]) -> LogStats {
    let mut rows: BTreeMap<(String, IssueType), StatsRow> = BTreeMap::new();
    let mut sessions = BTreeSet::new();
    let mut files = BTreeSet::new();
    let mut stats = LogStats {
        totals: StatsRow {
            source_id: "*".to_string(),
            ..StatsRow::default()
        },
        ..LogStats::default()
    };

    for record in records {
        if record.mode == RecordMode::Preview {
            stats.preview_records += 1;
            continue;
        }
        sessions.insert(record.session_id.as_str());
        files.insert(record.file_path.as_str());
        rows.entry((record.source_id.clone(), record.issue_type))
            .or_insert_with(|| StatsRow {
                source_id: record.source_id.clone(),
                issue_type: Some(record.issue_type),
                ..StatsRow::default()
            })
            .add(record);
        stats.totals.add(record);
    }

    stats.sessions = sessions.len() as u64;
    stats.files = files.len() as u64;
    stats.rows = rows.into_values().collect();
    stats
}
