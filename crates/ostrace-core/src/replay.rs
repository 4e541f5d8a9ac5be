//! Replay engine: a cursor and play state over one immutable [`Trace`].
//!
//! - The engine is the single source of truth for which step is displayed.
//! - Every cursor change renders exactly once, after the change is committed.
//! - Construction renders step 0 once, so a full playback from the start of an
//!   N-step trace issues N renders in total.
//! - Playback is driven by ticks from a [`TickScheduler`]. Only the tick the
//!   engine is currently waiting for is honored; anything else (cancelled by
//!   `pause`/`reset`, or superseded) is ignored.
//!
//! All operations run on the host's single control flow; nothing here is
//! shared across threads.

use std::time::Duration;

use ostrace_scheduler::{TickId, TickScheduler};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::adapter::{PresentationAdapter, StepView};
use crate::error::TraceError;
use crate::stats::Progress;
use crate::types::{Step, Trace};

/// Default pacing between playback ticks.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

/// Playback state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlayState {
    /// Idle; initial state and the state after reaching the end.
    #[default]
    Stopped,
    /// Advancing one step per tick.
    Playing,
    /// Suspended mid-playback.
    Paused,
}

/// Engine knobs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplayConfig {
    /// Delay between playback ticks.
    pub tick_interval: Duration,
}

impl ReplayConfig {
    /// Config with an interval in milliseconds (clamped to ≥ 1 ms).
    #[must_use]
    pub fn with_interval_ms(ms: u64) -> Self {
        Self {
            tick_interval: Duration::from_millis(ms.max(1)),
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self::with_interval_ms(DEFAULT_TICK_INTERVAL_MS)
    }
}

/// Cursor + play state machine over a trace.
#[derive(Debug)]
pub struct ReplayEngine<A, S> {
    trace: Trace,
    cursor: usize,
    play_state: PlayState,
    tick_interval: Duration,
    adapter: A,
    scheduler: S,
    pending: Option<TickId>,
    renders: u64,
    render_failures: Vec<TraceError>,
    progress: Vec<Progress>,
}

impl<A: PresentationAdapter, S: TickScheduler> ReplayEngine<A, S> {
    /// Wrap `trace` with a cursor at 0 and render the first step.
    pub fn new(trace: Trace, adapter: A, scheduler: S, cfg: ReplayConfig) -> Self {
        let progress = Progress::prefixes(&trace);
        let mut engine = Self {
            trace,
            cursor: 0,
            play_state: PlayState::Stopped,
            tick_interval: cfg.tick_interval.max(Duration::from_millis(1)),
            adapter,
            scheduler,
            pending: None,
            renders: 0,
            render_failures: Vec::new(),
            progress,
        };
        debug!(kind = %engine.trace.kind(), steps = engine.trace.len(), "replay engine attached");
        engine.present();
        engine
    }

    /* ---------------- Reads ---------------- */

    /// The trace being replayed.
    #[inline]
    #[must_use]
    pub const fn trace(&self) -> &Trace {
        &self.trace
    }

    /// Current cursor position.
    #[inline]
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Final step index.
    #[inline]
    #[must_use]
    pub fn last_index(&self) -> usize {
        self.trace.last_index()
    }

    /// Whether the cursor sits on the final step.
    #[inline]
    #[must_use]
    pub fn at_end(&self) -> bool {
        self.cursor == self.last_index()
    }

    /// Current play state.
    #[inline]
    #[must_use]
    pub const fn play_state(&self) -> PlayState {
        self.play_state
    }

    /// Delay between playback ticks.
    #[inline]
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Step at the cursor.
    #[must_use]
    pub fn current_step(&self) -> &Step {
        &self.trace.steps()[self.cursor]
    }

    /// Running counts up to the cursor.
    #[must_use]
    pub fn progress(&self) -> Progress {
        self.progress[self.cursor]
    }

    /// Tick the engine is waiting for, if playing.
    #[inline]
    #[must_use]
    pub const fn pending_tick(&self) -> Option<TickId> {
        self.pending
    }

    /// Number of render calls issued so far (including failed ones).
    #[inline]
    #[must_use]
    pub const fn render_count(&self) -> u64 {
        self.renders
    }

    /// The presentation adapter.
    #[inline]
    pub const fn adapter(&self) -> &A {
        &self.adapter
    }

    /// The presentation adapter, mutably.
    #[inline]
    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    /// The tick scheduler.
    #[inline]
    pub const fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// The tick scheduler, mutably (hosts drain due ticks through this).
    #[inline]
    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// Drain render failures recorded since the last call.
    pub fn take_render_failures(&mut self) -> Vec<TraceError> {
        std::mem::take(&mut self.render_failures)
    }

    /// Tear down, returning the trace, adapter and scheduler.
    pub fn into_parts(mut self) -> (Trace, A, S) {
        self.cancel_pending();
        (self.trace, self.adapter, self.scheduler)
    }

    /* ---------------- Navigation ---------------- */

    /// Advance one step. No-op at the last step.
    pub fn next(&mut self) -> bool {
        if self.at_end() {
            return false;
        }
        self.move_to(self.cursor + 1)
    }

    /// Go back one step. No-op at step 0.
    pub fn previous(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.move_to(self.cursor - 1)
    }

    /// Jump to `index`, clamped to `[0, last_index]`. Never fails.
    pub fn seek(&mut self, index: i64) -> bool {
        let target = usize::try_from(index).map_or(0, |i| i.min(self.last_index()));
        self.move_to(target)
    }

    /// Cursor to 0 and state to STOPPED, cancelling any pending tick.
    pub fn reset(&mut self) -> bool {
        self.cancel_pending();
        let was = self.play_state;
        self.play_state = PlayState::Stopped;
        let moved = self.move_to(0);
        if was != PlayState::Stopped {
            debug!(from = ?was, "reset to STOPPED");
        }
        moved || was != PlayState::Stopped
    }

    /* ---------------- Playback ---------------- */

    /// Start (or resume) playback.
    ///
    /// At the last step this auto-stops immediately without scheduling a tick.
    /// Returns `true` if playback is now running.
    pub fn play(&mut self) -> bool {
        if self.play_state == PlayState::Playing {
            return true;
        }
        if self.at_end() {
            self.play_state = PlayState::Stopped;
            debug!(cursor = self.cursor, "play at last step; stopped");
            return false;
        }
        self.play_state = PlayState::Playing;
        self.arm();
        debug!(cursor = self.cursor, interval = ?self.tick_interval, "playing");
        true
    }

    /// Suspend playback, keeping the cursor. No-op unless playing.
    pub fn pause(&mut self) -> bool {
        if self.play_state != PlayState::Playing {
            return false;
        }
        self.cancel_pending();
        self.play_state = PlayState::Paused;
        debug!(cursor = self.cursor, "paused");
        true
    }

    /// Change playback pacing; applies from the next scheduled tick.
    pub fn set_tick_interval(&mut self, interval: Duration) {
        self.tick_interval = interval.max(Duration::from_millis(1));
    }

    /// Deliver a scheduler tick. Returns `true` if it advanced the cursor.
    ///
    /// Ticks other than the one currently awaited are ignored.
    pub fn on_tick(&mut self, id: TickId) -> bool {
        if self.pending != Some(id) {
            debug!(tick = %id, "ignoring stale tick");
            return false;
        }
        self.pending = None;
        if self.play_state != PlayState::Playing {
            return false;
        }
        let moved = self.next();
        if self.play_state == PlayState::Playing {
            self.arm();
        }
        moved
    }

    /* ---------------- Internals ---------------- */

    fn move_to(&mut self, target: usize) -> bool {
        if target == self.cursor {
            return false;
        }
        self.cursor = target;
        if self.play_state == PlayState::Playing && self.at_end() {
            self.cancel_pending();
            self.play_state = PlayState::Stopped;
            debug!(cursor = self.cursor, "reached last step; stopped");
        }
        self.present();
        true
    }

    fn arm(&mut self) {
        self.cancel_pending();
        self.pending = Some(self.scheduler.schedule(self.tick_interval));
    }

    fn cancel_pending(&mut self) {
        if let Some(id) = self.pending.take() {
            self.scheduler.cancel(id);
        }
    }

    fn present(&mut self) {
        let index = self.cursor;
        let last_index = self.trace.last_index();
        let view = StepView {
            kind: self.trace.kind(),
            step: &self.trace.steps()[index],
            index,
            last_index,
            summary: (index == last_index).then(|| self.trace.summary()),
            play_state: self.play_state,
            progress: self.progress[index],
            topology: self.trace.topology(),
        };
        self.renders += 1;
        if let Err(e) = self.adapter.render(&view) {
            warn!(index, error = %e, "render failed; replay state kept");
            self.render_failures.push(TraceError::AdapterRenderFailure {
                index,
                reason: e.reason().to_owned(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::RenderError;
    use crate::types::{BankerAction, BankerStep, BankerSummary, ProcessId, Summary, TraceKind};
    use ostrace_scheduler::DeadlineQueue;

    #[derive(Default)]
    struct Recorder {
        seen: Vec<(usize, bool, PlayState)>,
        fail_at: Option<usize>,
    }

    impl PresentationAdapter for Recorder {
        fn render(&mut self, view: &StepView<'_>) -> Result<(), RenderError> {
            self.seen
                .push((view.index, view.summary.is_some(), view.play_state));
            if self.fail_at == Some(view.index) {
                return Err(RenderError::new("canvas gone"));
            }
            Ok(())
        }
    }

    fn trace(n: usize) -> Trace {
        let steps = (0..n)
            .map(|i| {
                Step::Banker(BankerStep {
                    process: Some(ProcessId::Index(i as u64)),
                    work: vec![i as u64, 1, 2],
                    action: BankerAction::Executed,
                })
            })
            .collect();
        Trace::from_parts(
            TraceKind::Banker,
            steps,
            Summary::Banker(BankerSummary {
                safe: true,
                safe_sequence: vec![],
            }),
            vec![],
        )
        .unwrap()
    }

    fn engine(n: usize) -> ReplayEngine<Recorder, DeadlineQueue<ostrace_scheduler::ManualClock>> {
        ReplayEngine::new(
            trace(n),
            Recorder::default(),
            DeadlineQueue::default(),
            ReplayConfig::default(),
        )
    }

    fn drive(e: &mut ReplayEngine<Recorder, DeadlineQueue<ostrace_scheduler::ManualClock>>) {
        while let Some(id) = e.scheduler_mut().fast_forward() {
            e.on_tick(id);
        }
    }

    #[test]
    fn construction_renders_step_zero() {
        let e = engine(3);
        assert_eq!(e.cursor(), 0);
        assert_eq!(e.play_state(), PlayState::Stopped);
        assert_eq!(e.adapter().seen, vec![(0, false, PlayState::Stopped)]);
    }

    #[test]
    fn next_at_end_is_idempotent() {
        let mut e = engine(2);
        assert!(e.next());
        assert!(!e.next());
        assert!(!e.next());
        assert_eq!(e.cursor(), 1);
        assert_eq!(e.render_count(), 2);
        assert_eq!(e.adapter().seen.last(), Some(&(1, true, PlayState::Stopped)));
    }

    #[test]
    fn previous_at_zero_is_noop() {
        let mut e = engine(2);
        assert!(!e.previous());
        assert_eq!(e.render_count(), 1);
    }

    #[test]
    fn seek_clamps_and_skips_same_position() {
        let mut e = engine(5);
        assert!(e.seek(99));
        assert_eq!(e.cursor(), 4);
        assert!(e.seek(-7));
        assert_eq!(e.cursor(), 0);
        assert!(!e.seek(0));
        assert_eq!(e.render_count(), 3);
    }

    #[test]
    fn play_runs_to_completion_with_n_renders() {
        let mut e = engine(4);
        assert!(e.play());
        drive(&mut e);
        assert_eq!(e.cursor(), 3);
        assert_eq!(e.play_state(), PlayState::Stopped);
        assert_eq!(e.render_count(), 4);
        assert!(e.pending_tick().is_none());
        assert_eq!(e.adapter().seen.last(), Some(&(3, true, PlayState::Stopped)));
    }

    #[test]
    fn play_on_single_step_trace_stops_without_ticks() {
        let mut e = engine(1);
        assert!(!e.play());
        assert_eq!(e.play_state(), PlayState::Stopped);
        assert!(e.scheduler().is_empty());
        assert_eq!(e.render_count(), 1);
    }

    #[test]
    fn pause_cancels_pending_tick_and_ignores_late_delivery() {
        let mut e = engine(5);
        e.play();
        let id = e.pending_tick().unwrap();
        assert!(e.pause());
        assert!(e.scheduler().is_empty());
        assert!(!e.on_tick(id), "tick arriving after pause must be ignored");
        assert_eq!(e.cursor(), 0);
        assert_eq!(e.play_state(), PlayState::Paused);
    }

    #[test]
    fn reset_from_playing_returns_to_start() {
        let mut e = engine(5);
        e.play();
        let first = e.scheduler_mut().fast_forward().unwrap();
        assert!(e.on_tick(first));
        assert_eq!(e.cursor(), 1);
        let stale = e.pending_tick().unwrap();
        assert!(e.reset());
        assert_eq!(e.cursor(), 0);
        assert_eq!(e.play_state(), PlayState::Stopped);
        assert!(!e.on_tick(stale));
        assert!(e.scheduler().is_empty());
    }

    #[test]
    fn manual_seek_to_end_while_playing_stops() {
        let mut e = engine(5);
        e.play();
        e.seek(4);
        assert_eq!(e.play_state(), PlayState::Stopped);
        assert!(e.scheduler().is_empty());
        assert_eq!(e.adapter().seen.last(), Some(&(4, true, PlayState::Stopped)));
    }

    #[test]
    fn render_failure_does_not_roll_back() {
        let mut e = ReplayEngine::new(
            trace(3),
            Recorder {
                fail_at: Some(1),
                ..Recorder::default()
            },
            DeadlineQueue::default(),
            ReplayConfig::default(),
        );
        assert!(e.next());
        assert_eq!(e.cursor(), 1);
        let failures = e.take_render_failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].step_index(), Some(1));
        assert!(e.take_render_failures().is_empty());
        assert!(e.next());
        assert_eq!(e.cursor(), 2);
    }

    #[test]
    fn paused_playback_resumes_from_cursor() {
        let mut e = engine(4);
        e.play();
        let t = e.scheduler_mut().fast_forward().unwrap();
        e.on_tick(t);
        e.pause();
        assert_eq!(e.cursor(), 1);
        assert!(e.play());
        drive(&mut e);
        assert_eq!(e.cursor(), 3);
        assert_eq!(e.render_count(), 4);
    }

    #[test]
    fn interval_is_clamped_to_one_millisecond() {
        let mut e = engine(2);
        e.set_tick_interval(Duration::ZERO);
        assert_eq!(e.tick_interval(), Duration::from_millis(1));
        assert_eq!(ReplayConfig::with_interval_ms(0).tick_interval, Duration::from_millis(1));
    }

    #[test]
    fn progress_follows_cursor_in_both_directions() {
        let mut e = engine(4);
        e.seek(3);
        assert_eq!(e.progress(), Progress::at(e.trace(), 3));
        e.previous();
        assert_eq!(e.progress().executed, 3);
        e.reset();
        assert_eq!(e.progress(), Progress::at(e.trace(), 0));
    }
}
