// crates/ostrace-cli/src/playback.rs

//! Feeding ticks to a [`ReplayEngine`].
//!
//! The engine never sleeps; a driver owns time. `run_realtime` sleeps on the
//! wall clock until the next deadline, `run_virtual` jumps a manual clock from
//! deadline to deadline so a full playback costs no wall time.

use anyhow::{Context, Result};
use ostrace_core::{PlayState, PresentationAdapter, ReplayConfig, ReplayEngine, Trace, TraceError};
use ostrace_scheduler::{Clock, DeadlineQueue, ManualClock, SystemClock};
use std::io::Write;
use std::time::Duration;
use tracing::{debug, warn};

use crate::adapters::JsonLinesAdapter;

/// What a driver observed while playing to the end.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlaybackReport {
    /// Ticks delivered to the engine.
    pub ticks: usize,
    /// Adapter calls, including the initial one.
    pub renders: u64,
    /// Clock time from `play()` to the final step.
    pub elapsed: Duration,
    /// Adapter failures reported by the engine.
    pub render_failures: Vec<TraceError>,
}

/// Play from the current cursor to the last step in wall-clock time.
pub fn run_realtime<A: PresentationAdapter>(
    engine: &mut ReplayEngine<A, DeadlineQueue<SystemClock>>,
) -> PlaybackReport {
    let start = engine.scheduler().clock().now();
    let mut ticks = 0usize;
    engine.play();
    while engine.play_state() == PlayState::Playing {
        let Some(wait) = engine.scheduler().time_until_next() else {
            break;
        };
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
        while let Some(id) = engine.scheduler_mut().pop_due() {
            if engine.on_tick(id) {
                ticks += 1;
            }
        }
    }
    finish(engine, ticks, start)
}

/// Play from the current cursor to the last step on a manual clock.
pub fn run_virtual<A: PresentationAdapter>(
    engine: &mut ReplayEngine<A, DeadlineQueue<ManualClock>>,
) -> PlaybackReport {
    let start = engine.scheduler().clock().now();
    let mut ticks = 0usize;
    engine.play();
    while let Some(id) = engine.scheduler_mut().fast_forward() {
        if engine.on_tick(id) {
            ticks += 1;
        }
    }
    finish(engine, ticks, start)
}

fn finish<A, C>(
    engine: &mut ReplayEngine<A, DeadlineQueue<C>>,
    ticks: usize,
    start: Duration,
) -> PlaybackReport
where
    A: PresentationAdapter,
    C: Clock,
{
    let elapsed = engine.scheduler().clock().now().saturating_sub(start);
    let render_failures = engine.take_render_failures();
    if !render_failures.is_empty() {
        warn!(count = render_failures.len(), "some steps failed to render");
    }
    debug!(ticks, ?elapsed, cursor = engine.cursor(), "playback finished");
    PlaybackReport {
        ticks,
        renders: engine.render_count(),
        elapsed,
        render_failures,
    }
}

/// Replay `trace` on a virtual clock, writing one JSON view per step to `out`.
///
/// Returns the writer with everything flushed, plus the report.
pub fn export_jsonl<W: Write>(
    trace: Trace,
    out: W,
    cfg: ReplayConfig,
) -> Result<(W, PlaybackReport)> {
    let mut engine = ReplayEngine::new(
        trace,
        JsonLinesAdapter::new(out),
        DeadlineQueue::default(),
        cfg,
    );
    let report = run_virtual(&mut engine);
    let (_, adapter, _) = engine.into_parts();
    let mut out = adapter.into_inner();
    out.flush().context("flush JSONL writer")?;
    Ok((out, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ostrace_core::{
        FnAdapter, FrameSlot, MemoryStep, MemorySummary, NullAdapter, RenderError, Step, StepView,
        Summary, TraceKind,
    };

    fn memory_trace(n: usize) -> Trace {
        let steps = (0..n)
            .map(|i| {
                Step::Memory(MemoryStep {
                    process: None,
                    reference: i as u64,
                    frames: vec![FrameSlot::Page(i as u64)],
                    page_fault: true,
                })
            })
            .collect();
        Trace::from_parts(
            TraceKind::Memory,
            steps,
            Summary::Memory(MemorySummary {
                total_page_faults: n as u64,
                hits: 0,
            }),
            vec![],
        )
        .unwrap()
    }

    #[test]
    fn virtual_playback_takes_interval_per_step() {
        let (out, report) =
            export_jsonl(memory_trace(4), Vec::new(), ReplayConfig::with_interval_ms(800)).unwrap();
        assert_eq!(report.ticks, 3);
        assert_eq!(report.renders, 4);
        assert_eq!(report.elapsed, Duration::from_millis(2400));
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 4);
    }

    #[test]
    fn failures_are_reported_not_fatal() {
        let adapter = FnAdapter(|view: &StepView<'_>| -> Result<(), RenderError> {
            if view.index == 1 {
                Err(RenderError::new("canvas gone"))
            } else {
                Ok(())
            }
        });
        let mut engine = ReplayEngine::new(
            memory_trace(3),
            adapter,
            DeadlineQueue::default(),
            ReplayConfig::default(),
        );
        let report = run_virtual(&mut engine);
        assert_eq!(engine.cursor(), 2);
        assert_eq!(
            report.render_failures,
            vec![TraceError::AdapterRenderFailure {
                index: 1,
                reason: "canvas gone".into()
            }]
        );
    }

    #[test]
    fn realtime_single_step_returns_immediately() {
        let mut engine = ReplayEngine::new(
            memory_trace(1),
            NullAdapter,
            DeadlineQueue::new(SystemClock::new()),
            ReplayConfig::with_interval_ms(10_000),
        );
        let report = run_realtime(&mut engine);
        assert_eq!(report.ticks, 0);
        assert_eq!(engine.play_state(), PlayState::Stopped);
    }
}
