// crates/ostrace-scheduler/src/lib.rs

//! Cancellable tick scheduling for replay playback.
//!
//! Playback is a recurring dispatch of "advance one step" onto the host's single
//! control flow. This crate provides the pieces that make that dispatch
//! deterministic and cancellable without threads:
//!
//! - [`TickScheduler`]: the capability the replay engine depends on
//!   (schedule a tick after a delay, cancel a pending tick).
//! - [`Clock`]: a monotonic time source; [`ManualClock`] is advanced explicitly
//!   (tests, offline export), [`SystemClock`] follows wall time.
//! - [`DeadlineQueue`]: the concrete scheduler. The host drains it with
//!   [`DeadlineQueue::pop_due`] and may sleep until [`DeadlineQueue::next_deadline`].
//!
//! Ticks never fire early: a tick is due once `now >= deadline`. Ticks due at the
//! same instant are drained in scheduling order.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used
)]

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::time::{Duration, Instant};

use tracing::trace;

/// Opaque handle for one scheduled tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TickId(u64);

impl TickId {
    /// Raw sequence number (monotonic per scheduler).
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TickId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tick#{}", self.0)
    }
}

/// Schedule/cancel capability consumed by the replay engine.
pub trait TickScheduler {
    /// Schedule one tick to become due `after` from now.
    fn schedule(&mut self, after: Duration) -> TickId;

    /// Cancel a pending tick. Returns `true` if it was still pending.
    ///
    /// After this returns, `id` is never delivered by this scheduler.
    fn cancel(&mut self, id: TickId) -> bool;
}

/// Monotonic time source, measured from an arbitrary origin.
pub trait Clock {
    /// Elapsed time since the clock's origin.
    fn now(&self) -> Duration;
}

/// Clock that only moves when told to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ManualClock {
    now: Duration,
}

impl ManualClock {
    /// Clock at time zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            now: Duration::ZERO,
        }
    }

    /// Move time forward by `by`.
    pub fn advance(&mut self, by: Duration) {
        self.now = self.now.saturating_add(by);
    }

    /// Jump to `to`; moving backwards is ignored.
    pub fn set(&mut self, to: Duration) {
        if to > self.now {
            self.now = to;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now
    }
}

/// Wall clock anchored at construction time.
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Clock whose origin is "now".
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Ordered queue of pending ticks keyed by `(deadline, id)`.
#[derive(Debug)]
pub struct DeadlineQueue<C: Clock> {
    clock: C,
    next_id: u64,
    pending: BTreeSet<(Duration, TickId)>,
    deadlines: HashMap<TickId, Duration>,
}

impl<C: Clock> DeadlineQueue<C> {
    /// Empty queue driven by `clock`.
    #[must_use]
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            next_id: 0,
            pending: BTreeSet::new(),
            deadlines: HashMap::new(),
        }
    }

    /// The underlying clock.
    #[inline]
    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// Number of pending ticks.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no tick is pending.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Whether `id` is still pending.
    #[must_use]
    pub fn is_pending(&self, id: TickId) -> bool {
        self.deadlines.contains_key(&id)
    }

    /// Earliest pending deadline, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.pending.iter().next().map(|(d, _)| *d)
    }

    /// Time left until the earliest pending tick is due (zero if already due).
    #[must_use]
    pub fn time_until_next(&self) -> Option<Duration> {
        let now = self.clock.now();
        self.next_deadline().map(|d| d.saturating_sub(now))
    }

    /// Remove and return the earliest tick whose deadline has passed.
    pub fn pop_due(&mut self) -> Option<TickId> {
        let now = self.clock.now();
        let first = *self.pending.iter().next()?;
        if first.0 > now {
            return None;
        }
        self.pending.remove(&first);
        self.deadlines.remove(&first.1);
        trace!(tick = %first.1, "tick due");
        Some(first.1)
    }

    /// Drop every pending tick.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.deadlines.clear();
    }
}

impl DeadlineQueue<ManualClock> {
    /// Advance the manual clock by `by`.
    pub fn advance(&mut self, by: Duration) {
        self.clock.advance(by);
    }

    /// Jump the manual clock to the next pending deadline and return that tick.
    ///
    /// Used by offline hosts that want playback without waiting on wall time.
    pub fn fast_forward(&mut self) -> Option<TickId> {
        let deadline = self.next_deadline()?;
        self.clock.set(deadline);
        self.pop_due()
    }
}

impl Default for DeadlineQueue<ManualClock> {
    fn default() -> Self {
        Self::new(ManualClock::new())
    }
}

impl<C: Clock> TickScheduler for DeadlineQueue<C> {
    fn schedule(&mut self, after: Duration) -> TickId {
        let id = TickId(self.next_id);
        self.next_id += 1;
        let deadline = self.clock.now().saturating_add(after);
        self.pending.insert((deadline, id));
        self.deadlines.insert(id, deadline);
        trace!(tick = %id, ?deadline, "tick scheduled");
        id
    }

    fn cancel(&mut self, id: TickId) -> bool {
        match self.deadlines.remove(&id) {
            Some(deadline) => {
                self.pending.remove(&(deadline, id));
                trace!(tick = %id, "tick cancelled");
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn ticks_never_fire_early() {
        let mut q = DeadlineQueue::default();
        let id = q.schedule(10 * MS);
        q.advance(9 * MS);
        assert_eq!(q.pop_due(), None);
        q.advance(MS);
        assert_eq!(q.pop_due(), Some(id));
        assert!(q.is_empty());
    }

    #[test]
    fn same_deadline_drains_in_schedule_order() {
        let mut q = DeadlineQueue::default();
        let a = q.schedule(5 * MS);
        let b = q.schedule(5 * MS);
        let c = q.schedule(MS);
        q.advance(5 * MS);
        assert_eq!(q.pop_due(), Some(c));
        assert_eq!(q.pop_due(), Some(a));
        assert_eq!(q.pop_due(), Some(b));
        assert_eq!(q.pop_due(), None);
    }

    #[test]
    fn cancelled_tick_is_never_delivered() {
        let mut q = DeadlineQueue::default();
        let a = q.schedule(MS);
        let b = q.schedule(2 * MS);
        assert!(q.cancel(a));
        assert!(!q.cancel(a), "second cancel is a no-op");
        q.advance(10 * MS);
        assert_eq!(q.pop_due(), Some(b));
        assert_eq!(q.pop_due(), None);
    }

    #[test]
    fn fast_forward_jumps_to_next_deadline() {
        let mut q = DeadlineQueue::default();
        let a = q.schedule(1000 * MS);
        assert_eq!(q.time_until_next(), Some(1000 * MS));
        assert_eq!(q.fast_forward(), Some(a));
        assert_eq!(q.clock().now(), 1000 * MS);
        assert_eq!(q.fast_forward(), None);
    }

    #[test]
    fn manual_clock_does_not_go_backwards() {
        let mut c = ManualClock::new();
        c.advance(5 * MS);
        c.set(2 * MS);
        assert_eq!(c.now(), 5 * MS);
    }
}
