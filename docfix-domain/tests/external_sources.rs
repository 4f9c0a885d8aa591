#![cfg(unix)]

use docfix_domain::{DetectorError, RuleSource, RunLimits, SourceSpec};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use docfix_edit::Snapshot;
use docfix_types::issue::IssueKind;
use pretty_assertions::assert_eq;

fn sh(script: &str) -> (String, Vec<String>) {
    ("sh".to_string(), vec!["-c".to_string(), script.to_string()])
}

#[test]
fn command_source_parses_json_drafts() {
    let (program, args) = sh(
        r#"cat >/dev/null; echo '[{"type":"replace","line":2,"new_content":"B2","messages":["style"]}]'"#,
    );
    let spec = SourceSpec::new("lint", RuleSource::Command { program, args });
    let snapshot = Snapshot::from_text("doc.md", "A\nB\nC\n");

    let issues = spec.detect(&snapshot).expect("detect");
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].source_id, "lint");
    assert_eq!(issues[0].snapshot_version, 1);
    assert_eq!(issues[0].messages, vec!["style".to_string()]);
}

#[test]
fn command_source_sees_document_and_path() {
    let (program, args) = sh(
        r#"n=$(wc -l | tr -d ' '); printf '[{"type":"insert","line":%s,"content":["%s"]}]' $((n + 1)) "$DOCFIX_PATH""#,
    );
    let spec = SourceSpec::new("tail", RuleSource::Command { program, args });
    let snapshot = Snapshot::from_text("notes/today.md", "one\ntwo\n");

    let issues = spec.detect(&snapshot).expect("detect");
    assert_eq!(issues[0].anchor_line, 3);
    assert_eq!(
        issues[0].kind,
        IssueKind::Insert {
            content: vec!["notes/today.md".to_string()]
        }
    );
}

#[test]
fn failing_command_is_a_detector_error() {
    let (program, args) = sh("cat >/dev/null; echo boom >&2; exit 3");
    let spec = SourceSpec::new("broken", RuleSource::Command { program, args });
    let err = spec
        .detect(&Snapshot::from_text("doc.md", "x\n"))
        .expect_err("exit status");
    match err {
        DetectorError::Exit { stderr, .. } => assert_eq!(stderr, "boom"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn garbage_output_is_a_detector_error() {
    let (program, args) = sh("cat >/dev/null; echo not-json");
    let spec = SourceSpec::new("noisy", RuleSource::Command { program, args });
    let err = spec
        .detect(&Snapshot::from_text("doc.md", "x\n"))
        .expect_err("bad json");
    assert!(matches!(err, DetectorError::Output { .. }));
}

#[test]
fn missing_program_is_a_spawn_error() {
    let spec = SourceSpec::new(
        "ghost",
        RuleSource::Command {
            program: "docfix-definitely-not-installed".to_string(),
            args: vec![],
        },
    );
    let err = spec
        .detect(&Snapshot::from_text("doc.md", "x\n"))
        .expect_err("spawn");
    assert!(matches!(err, DetectorError::Spawn { .. }));
}

#[test]
fn rewrite_source_diffs_program_output() {
    let (program, args) = sh("sed 's/utilize/use/'");
    let spec = SourceSpec::new("rules", RuleSource::Rewrite { program, args });
    let snapshot = Snapshot::from_text("doc.md", "We utilize tools.\nFine.\n");

    let issues = spec.detect(&snapshot).expect("detect");
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].anchor_line, 1);
    assert_eq!(
        issues[0].kind,
        IssueKind::Replace {
            new_content: "We use tools.".to_string()
        }
    );
}

#[test]
fn hung_command_is_killed_at_the_timeout() {
    let (program, args) = sh("sleep 5");
    let spec = SourceSpec::new("slow", RuleSource::Command { program, args });
    let limits = RunLimits {
        timeout: Some(Duration::from_millis(200)),
        stop: None,
    };

    let started = Instant::now();
    let err = spec
        .detect_within(&Snapshot::from_text("doc.md", "x\n"), limits)
        .expect_err("timeout");
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(matches!(err, DetectorError::Timeout { .. }), "{err}");
}

#[test]
fn raised_stop_flag_kills_a_rewrite_program() {
    let (program, args) = sh("sleep 5");
    let spec = SourceSpec::new("slow", RuleSource::Rewrite { program, args });
    let stop = AtomicBool::new(false);
    let limits = RunLimits {
        timeout: None,
        stop: Some(&stop),
    };

    let started = Instant::now();
    let err = std::thread::scope(|scope| {
        scope.spawn(|| {
            std::thread::sleep(Duration::from_millis(100));
            stop.store(true, Ordering::SeqCst);
        });
        spec.detect_within(&Snapshot::from_text("doc.md", "x\n"), limits)
            .expect_err("cancelled")
    });
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(matches!(err, DetectorError::Cancelled { .. }), "{err}");
}
