//! Concurrent detection: every source against the same snapshot.

use crate::cancel::CancelToken;
use crate::error::SessionError;
use crossbeam::channel;
use docfix_domain::{DetectionCache, DetectorError, RunLimits, SourceSpec};
use docfix_edit::Snapshot;
use docfix_types::issue::Issue;
use docfix_types::summary::DetectorFailure;
use std::time::Duration;
use tracing::{debug, warn};

/// Per-source results in configured order.
#[derive(Debug, Default)]
pub struct Detection {
    /// One list per successful source, in source order.
    pub per_source: Vec<Vec<Issue>>,
    pub failures: Vec<DetectorFailure>,
}

/// Run `sources` against `snapshot` on up to `workers` scoped threads.
///
/// Results are reassembled in source order regardless of completion order.
/// A failing source contributes no issues and a [`DetectorFailure`]; an
/// external program running past `timeout` is killed and fails. When
/// `cancel` fires, running programs are killed, pending sources are skipped
/// and all results discarded.
pub fn detect_all(
    sources: &[SourceSpec],
    snapshot: &Snapshot,
    cache: &DetectionCache,
    workers: usize,
    timeout: Option<Duration>,
    cancel: &CancelToken,
) -> Result<Detection, SessionError> {
    if sources.is_empty() {
        return Ok(Detection::default());
    }

    let (job_tx, job_rx) = channel::unbounded::<usize>();
    let (result_tx, result_rx) = channel::unbounded::<(usize, Result<Vec<Issue>, DetectorError>)>();
    for idx in 0..sources.len() {
        // The receiver is alive until the scope below ends.
        let _ = job_tx.send(idx);
    }
    drop(job_tx);

    let workers = workers.clamp(1, sources.len());
    let limits = RunLimits {
        timeout,
        stop: Some(cancel.flag()),
    };
    std::thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                for idx in job_rx.iter() {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let spec = &sources[idx];
                    let result = cache.detect_within(spec, snapshot, limits);
                    if result_tx.send((idx, result)).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(result_tx);

    if cancel.is_cancelled() {
        debug!(path = %snapshot.path(), "detection cancelled, discarding results");
        return Err(SessionError::Cancelled);
    }

    let mut slots: Vec<Option<Result<Vec<Issue>, DetectorError>>> =
        sources.iter().map(|_| None).collect();
    for (idx, result) in result_rx.try_iter() {
        slots[idx] = Some(result);
    }

    let mut detection = Detection::default();
    for (spec, slot) in sources.iter().zip(slots) {
        match slot {
            Some(Ok(issues)) => {
                debug!(source = %spec.name, issues = issues.len(), "source finished");
                detection.per_source.push(issues);
            }
            Some(Err(e)) => {
                warn!(source = %spec.name, error = %e, "source failed");
                detection.failures.push(DetectorFailure {
                    source_id: spec.name.clone(),
                    message: e.to_string(),
                });
            }
            None => detection.failures.push(DetectorFailure {
                source_id: spec.name.clone(),
                message: "source did not run".to_string(),
            }),
        }
    }
    Ok(detection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docfix_domain::RuleSource;
    use docfix_types::issue::IssueDraft;
    use pretty_assertions::assert_eq;

    fn fixed(name: &str, issues: Vec<IssueDraft>) -> SourceSpec {
        SourceSpec::new(name, RuleSource::Static { issues })
    }

    #[test]
    fn results_come_back_in_source_order() {
        let snapshot = Snapshot::from_text("a.md", "a\nb\nc\n");
        let sources: Vec<SourceSpec> = (0..6)
            .map(|i| fixed(&format!("s{i}"), vec![IssueDraft::replace(i % 3 + 1, format!("v{i}"))]))
            .collect();

        let detection = detect_all(
            &sources,
            &snapshot,
            &DetectionCache::in_memory(),
            3,
            None,
            &CancelToken::new(),
        )
        .expect("detect");

        let names: Vec<&str> = detection
            .per_source
            .iter()
            .map(|issues| issues[0].source_id.as_str())
            .collect();
        assert_eq!(names, vec!["s0", "s1", "s2", "s3", "s4", "s5"]);
        assert!(detection.failures.is_empty());
    }

    #[test]
    fn failing_source_is_recorded_and_others_survive() {
        let snapshot = Snapshot::from_text("a.md", "a\n");
        let sources = vec![
            fixed("good", vec![IssueDraft::delete(1)]),
            fixed("bad", vec![IssueDraft::delete(7)]),
        ];

        let detection = detect_all(
            &sources,
            &snapshot,
            &DetectionCache::in_memory(),
            2,
            None,
            &CancelToken::new(),
        )
        .expect("detect");

        assert_eq!(detection.per_source.len(), 1);
        assert_eq!(detection.failures.len(), 1);
        assert_eq!(detection.failures[0].source_id, "bad");
    }

    #[test]
    fn cancelled_detection_discards_everything() {
        let snapshot = Snapshot::from_text("a.md", "a\n");
        let sources = vec![fixed("good", vec![IssueDraft::delete(1)])];
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = detect_all(&sources, &snapshot, &DetectionCache::in_memory(), 1, None, &cancel);
        assert!(matches!(result, Err(SessionError::Cancelled)));
    }

    #[cfg(unix)]
    fn sleeper(name: &str) -> SourceSpec {
        SourceSpec::new(
            name,
            RuleSource::Command {
                program: "sleep".to_string(),
                args: vec!["5".to_string()],
            },
        )
    }

    #[cfg(unix)]
    #[test]
    fn cancel_kills_a_running_program() {
        let snapshot = Snapshot::from_text("a.md", "a\n");
        let sources = vec![sleeper("slow")];
        let cancel = CancelToken::new();

        let started = std::time::Instant::now();
        let result = std::thread::scope(|scope| {
            scope.spawn(|| {
                std::thread::sleep(Duration::from_millis(100));
                cancel.cancel();
            });
            detect_all(&sources, &snapshot, &DetectionCache::in_memory(), 1, None, &cancel)
        });

        assert!(matches!(result, Err(SessionError::Cancelled)));
        assert!(
            started.elapsed() < Duration::from_secs(2),
            "cancellation waited {:?}",
            started.elapsed()
        );
    }

    #[cfg(unix)]
    #[test]
    fn slow_program_times_out_as_a_failure() {
        let snapshot = Snapshot::from_text("a.md", "a\n");
        let sources = vec![fixed("fast", vec![IssueDraft::delete(1)]), sleeper("slow")];

        let started = std::time::Instant::now();
        let detection = detect_all(
            &sources,
            &snapshot,
            &DetectionCache::in_memory(),
            2,
            Some(Duration::from_millis(200)),
            &CancelToken::new(),
        )
        .expect("detect");

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(detection.per_source.len(), 1);
        assert_eq!(detection.failures.len(), 1);
        assert_eq!(detection.failures[0].source_id, "slow");
        assert!(detection.failures[0].message.contains("did not finish"));
    }
}
