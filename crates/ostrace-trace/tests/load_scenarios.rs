//! End-to-end loading scenarios: wire document → `Trace` → replay.

use ostrace_core::{
    NullAdapter, ReplayConfig, ReplayEngine, Step, Summary, TraceError, TraceKind,
};
use ostrace_scheduler::DeadlineQueue;
use ostrace_trace::generator::{generate_banker, generate_deadlock, generate_memory};
use ostrace_trace::io::{load_trace_file, write_document_auto};
use ostrace_trace::load::{load, LoadOptions, Validation};
use serde_json::{json, Value};

fn strict() -> LoadOptions<'static> {
    LoadOptions::new(Validation::Strict)
}

fn memory_doc(frames: &[Value], faults: &[bool], declared: u64) -> Value {
    let steps: Vec<Value> = frames
        .iter()
        .zip(faults)
        .enumerate()
        .map(|(i, (f, pf))| json!({ "reference": i, "frames": f, "page_fault": pf }))
        .collect();
    json!({ "steps": steps, "total_page_faults": declared })
}

#[test]
fn step_count_matches_source_records() {
    for seed in 0..8 {
        let doc = generate_banker(7, 3, seed % 2 == 0, seed);
        let t = load(Some(&doc), TraceKind::Banker, &strict()).unwrap();
        assert_eq!(t.len(), doc.as_array().unwrap().len());

        let fx = generate_deadlock(6, 2, (seed % 3) as usize, seed);
        let t = load(Some(&fx.trace), TraceKind::Deadlock, &strict()).unwrap();
        assert_eq!(t.len(), fx.trace.as_array().unwrap().len() - 1, "summary excluded");

        let doc = generate_memory(25, 3, seed);
        let t = load(Some(&doc), TraceKind::Memory, &strict()).unwrap();
        assert_eq!(t.len(), 25);
    }
}

#[test]
fn memory_frames_must_keep_their_width() {
    let ok = memory_doc(
        &[json!([7, -1, -1]), json!([7, 0, -1]), json!([7, 0, 1])],
        &[true, true, true],
        3,
    );
    let t = load(Some(&ok), TraceKind::Memory, &strict()).unwrap();
    assert_eq!(t.len(), 3);

    let bad = memory_doc(
        &[json!([7, -1, -1]), json!([7, 0, -1]), json!([7, 0, 1, 2])],
        &[true, true, true],
        3,
    );
    let err = load(Some(&bad), TraceKind::Memory, &strict()).unwrap_err();
    assert!(matches!(err, TraceError::InconsistentShape { index: 2, .. }), "{err}");
}

#[test]
fn banker_example_plays_and_stops_at_end() {
    let doc = json!([
        { "action": "executed", "process": 1, "work": [3, 3, 2] },
        { "action": "executed", "process": 3, "work": [5, 3, 2] }
    ]);
    let trace = load(Some(&doc), TraceKind::Banker, &strict()).unwrap();
    assert_eq!(trace.len(), 2);

    let mut e = ReplayEngine::new(
        trace,
        NullAdapter,
        DeadlineQueue::default(),
        ReplayConfig::default(),
    );
    assert!(e.next());
    assert!(!e.next());
    assert_eq!(e.cursor(), 1);
    let renders = e.render_count();
    assert!(!e.next());
    assert_eq!(e.render_count(), renders);
}

#[test]
fn deadlocked_process_missing_from_graph_is_dangling() {
    let doc = json!([
        { "process": 1, "can_run": false, "action": "waiting", "work_before": [0, 0], "work_after": [0, 0] },
        { "process": 2, "can_run": false, "action": "waiting", "work_before": [0, 0], "work_after": [0, 0] },
        { "deadlock_detected": true, "deadlocked_processes": [1, 2] }
    ]);
    let full = json!({ "deadlock": { "edges": [
        { "from": "P1", "to": "R1" }, { "from": "R1", "to": "P2" }, { "from": "P2", "to": "R1" }
    ] } });
    let t = load(Some(&doc), TraceKind::Deadlock, &strict().with_topology(&full)).unwrap();
    assert_eq!(t.len(), 2);
    assert_eq!(t.topology().len(), 3);

    let partial = json!({ "deadlock": { "edges": [{ "from": "P1", "to": "R1" }] } });
    let err = load(Some(&doc), TraceKind::Deadlock, &strict().with_topology(&partial)).unwrap_err();
    assert_eq!(err, TraceError::DanglingCycleNode { node: "P2".into() });
}

#[test]
fn fault_total_mismatch_is_strict_error_or_lenient_warning() {
    let doc = memory_doc(
        &[json!([1, -1]), json!([1, 2]), json!([3, 2]), json!([3, 4]), json!([3, 4])],
        &[true, true, true, true, false],
        5,
    );
    let err = load(Some(&doc), TraceKind::Memory, &strict()).unwrap_err();
    assert!(matches!(err, TraceError::SummaryMismatch { index: None, .. }));

    let t = load(Some(&doc), TraceKind::Memory, &LoadOptions::new(Validation::Lenient)).unwrap();
    assert_eq!(t.warnings().len(), 1);
    assert_eq!(t.warnings()[0].code(), "summary_mismatch");
    let Summary::Memory(s) = t.summary() else { panic!("memory summary expected") };
    assert_eq!(s.total_page_faults, 5);
    assert_eq!(s.hits, 1);
}

#[test]
fn kind_mismatch_is_schema_error() {
    let memory = generate_memory(4, 2, 1);
    let err = load(Some(&memory), TraceKind::Banker, &strict()).unwrap_err();
    assert!(matches!(err, TraceError::SchemaMismatch { kind: TraceKind::Banker, .. }));
}

#[test]
fn empty_frames_decode_as_empty_slots() {
    let doc = memory_doc(&[json!([7, null, -1])], &[true], 1);
    let t = load(Some(&doc), TraceKind::Memory, &strict()).unwrap();
    let Step::Memory(m) = &t.steps()[0] else { panic!("memory step expected") };
    assert!(m.has_free_frame());
    assert_eq!(m.frame_of_reference(), None);
}

#[test]
fn files_load_through_io_with_topology() {
    let dir = tempfile::tempdir().unwrap();
    let fx = generate_deadlock(4, 2, 2, 11);
    let trace_path = dir.path().join("deadlock_steps.cbor");
    let topo_path = dir.path().join("input.json");
    write_document_auto(&trace_path, &fx.trace).unwrap();
    write_document_auto(&topo_path, &fx.topology).unwrap();

    let t = load_trace_file(&trace_path, TraceKind::Deadlock, Validation::Strict, Some(&topo_path))
        .unwrap();
    assert_eq!(t.kind(), TraceKind::Deadlock);
    assert!(!t.topology().is_empty());

    let err = load_trace_file(
        &trace_path,
        TraceKind::Deadlock,
        Validation::Strict,
        Some(&dir.path().join("missing.json")),
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<TraceError>(),
        Some(TraceError::ArtifactNotFound { .. })
    ));
}

#[test]
fn invalid_file_surfaces_typed_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("banker_steps.json");
    write_document_auto(&path, &json!([{ "action": "skipped", "process": 0, "work": [1] }])).unwrap();
    let err = load_trace_file(&path, TraceKind::Banker, Validation::Lenient, None).unwrap_err();
    assert_eq!(
        err.downcast_ref::<TraceError>(),
        Some(&TraceError::UnknownAction { index: 0, action: "skipped".into() })
    );
}
