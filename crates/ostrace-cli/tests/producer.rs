//! Producer round-trips against stand-in shell scripts.
#![cfg(unix)]

use ostrace_cli::playback::export_jsonl;
use ostrace_cli::producer::Producer;
use ostrace_core::{ReplayConfig, Summary, TraceError, TraceKind};
use ostrace_trace::load::Validation;
use ostrace_trace::request::RunRequest;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

// Writing a script while another test thread forks can leave the file busy
// (ETXTBSY) at exec time; tests that create and run scripts take this lock.
static EXEC: Mutex<()> = Mutex::new(());

fn exec_lock() -> MutexGuard<'static, ()> {
    EXEC.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

#[test]
fn successful_run_loads_and_exports() {
    let _g = exec_lock();
    let dir = tempfile::tempdir().unwrap();
    let exe = script(
        dir.path(),
        "core.sh",
        r#"grep -q '"mode": "BANKER"' "$1" || exit 9
cat > "$2" <<'EOF'
[
  { "process": 1, "action": "executed", "work": [5, 3, 2] },
  { "process": 3, "action": "executed", "work": [7, 4, 3] }
]
EOF"#,
    );
    let producer = Producer::new(exe, dir.path().join("data"));
    let trace = producer
        .run_and_load(&RunRequest::demo(TraceKind::Banker), Validation::Strict)
        .unwrap();
    assert_eq!(trace.len(), 2);
    let Summary::Banker(s) = trace.summary() else { panic!("banker summary expected") };
    assert!(s.safe);

    let (out, report) = export_jsonl(trace, Vec::new(), ReplayConfig::with_interval_ms(1)).unwrap();
    assert_eq!(report.renders, 2);
    assert_eq!(String::from_utf8(out).unwrap().lines().count(), 2);
}

#[test]
fn deadlock_run_checks_against_request_edges() {
    let _g = exec_lock();
    let dir = tempfile::tempdir().unwrap();
    // Process 3 is not part of the demo graph (P1, P2 only).
    let exe = script(
        dir.path(),
        "core.sh",
        r#"cat > "$2" <<'EOF'
[
  { "process": 3, "can_run": false, "action": "waiting", "work_before": [0], "work_after": [0] },
  { "deadlock_detected": true, "deadlocked_processes": [3] }
]
EOF"#,
    );
    let producer = Producer::new(exe, dir.path());
    let err = producer
        .run_and_load(&RunRequest::demo(TraceKind::Deadlock), Validation::Strict)
        .unwrap_err();
    assert_eq!(
        err.downcast_ref::<TraceError>(),
        Some(&TraceError::DanglingCycleNode { node: "P3".into() })
    );
}

#[test]
fn non_zero_exit_is_a_hard_failure() {
    let _g = exec_lock();
    let dir = tempfile::tempdir().unwrap();
    let exe = script(dir.path(), "core.sh", "echo 'Error: bad matrix' >&2\nexit 3");
    let producer = Producer::new(exe, dir.path());
    let err = producer.run(&RunRequest::demo(TraceKind::Memory)).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("code 3"), "{msg}");
    assert!(msg.contains("bad matrix"), "{msg}");
}

#[test]
fn in_band_error_is_reported() {
    let _g = exec_lock();
    let dir = tempfile::tempdir().unwrap();
    let exe = script(dir.path(), "core.sh", r#"echo '{"error": "Unknown mode: X"}' > "$2""#);
    let producer = Producer::new(exe, dir.path());
    let err = producer.run(&RunRequest::demo(TraceKind::Memory)).unwrap_err();
    assert!(err.to_string().contains("Unknown mode"));
}

#[test]
fn producer_that_writes_nothing_is_not_found() {
    let _g = exec_lock();
    let dir = tempfile::tempdir().unwrap();
    let exe = script(dir.path(), "core.sh", "exit 0");
    let producer = Producer::new(exe, dir.path());
    let err = producer
        .run_and_load(&RunRequest::demo(TraceKind::Memory), Validation::Strict)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<TraceError>(),
        Some(TraceError::ArtifactNotFound { .. })
    ));
}
