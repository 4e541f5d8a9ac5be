//! Scripted stepping sessions on a manual clock.

use ostrace_cli::adapters::TextAdapter;
use ostrace_cli::interactive::run_commands;
use ostrace_core::{PlayState, ReplayConfig, ReplayEngine, Trace, TraceKind};
use ostrace_scheduler::{Clock, DeadlineQueue, ManualClock};
use ostrace_trace::load::{load, LoadOptions};
use serde_json::json;
use std::io::Cursor;

type Session = ReplayEngine<TextAdapter<Vec<u8>>, DeadlineQueue<ManualClock>>;

fn banker(n: u64) -> Trace {
    let doc: Vec<_> = (0..n)
        .map(|i| json!({ "action": "executed", "process": i, "work": [i + 1, 2] }))
        .collect();
    load(Some(&json!(doc)), TraceKind::Banker, &LoadOptions::default()).unwrap()
}

fn session(n: u64) -> Session {
    ReplayEngine::new(
        banker(n),
        TextAdapter::new(Vec::new()),
        DeadlineQueue::default(),
        ReplayConfig::with_interval_ms(1000),
    )
}

fn output(engine: Session) -> String {
    let (_, adapter, _) = engine.into_parts();
    String::from_utf8(adapter.into_inner()).unwrap()
}

#[test]
fn scripted_session_moves_and_plays() {
    let mut e = session(4);
    let script = "n\nn\np\nseek 9\nreset\nplay\nwait 2500\npause\nq\nn\n";
    let report = run_commands(&mut e, Cursor::new(script)).unwrap();

    assert!(report.quit);
    assert_eq!(report.commands, 9);
    assert_eq!(report.ticks, 2);
    assert!(report.rejected.is_empty());
    assert_eq!(e.cursor(), 2);
    assert_eq!(e.play_state(), PlayState::Paused);
    assert!(e.scheduler().is_empty());
    assert_eq!(e.render_count(), 8);

    let text = output(e);
    let steps: Vec<&str> = text
        .lines()
        .filter(|l| l.starts_with("Step "))
        .map(|l| &l[..8])
        .collect();
    assert_eq!(
        steps,
        vec!["Step 1/4", "Step 2/4", "Step 3/4", "Step 2/4", "Step 4/4", "Step 1/4", "Step 2/4", "Step 3/4"]
    );
    assert_eq!(text.matches("System is SAFE").count(), 1);
}

#[test]
fn bad_lines_are_skipped_and_input_end_closes() {
    let mut e = session(3);
    let report = run_commands(&mut e, Cursor::new("jump\nseek x\n\n  next  \n")).unwrap();
    assert!(!report.quit);
    assert_eq!(report.commands, 1);
    assert_eq!(report.rejected.len(), 2);
    assert!(report.rejected[1].contains("bad step index"), "{:?}", report.rejected);
    assert_eq!(e.cursor(), 1);
}

#[test]
fn waiting_past_the_end_stops_playback() {
    let mut e = session(3);
    let report = run_commands(&mut e, Cursor::new("interval 200\nplay\nwait 10000\n")).unwrap();
    assert_eq!(report.ticks, 2);
    assert_eq!(e.cursor(), 2);
    assert_eq!(e.play_state(), PlayState::Stopped);
    assert_eq!(e.scheduler().clock().now().as_millis(), 10_000);
    assert!(output(e).ends_with("System is SAFE. Safe Sequence: P0 -> P1 -> P2\n"));
}
