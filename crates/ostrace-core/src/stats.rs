//! Running statistics for "how far along" displays.
//!
//! Counts are over `steps[0..=index]`. The trace itself never caches derived
//! state; the replay engine keeps one [`Progress::prefixes`] table per trace.

use serde::Serialize;

use crate::types::{BankerAction, DeadlockAction, Step, Trace};

/// Counts accumulated up to and including one cursor position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// Steps covered (`index + 1`).
    pub steps_seen: usize,
    /// BANKER/DEADLOCK steps with action `executed`.
    pub executed: usize,
    /// DEADLOCK steps with action `waiting`.
    pub waiting: usize,
    /// BANKER steps with action `deadlock`.
    pub deadlocks: usize,
    /// MEMORY steps that faulted.
    pub page_faults: usize,
    /// MEMORY steps that hit.
    pub hits: usize,
}

impl Progress {
    /// Counts for `steps[0..=index]` (clamped to the trace).
    #[must_use]
    pub fn at(trace: &Trace, index: usize) -> Self {
        let end = index.min(trace.last_index()) + 1;
        trace.steps()[..end]
            .iter()
            .fold(Self::default(), |mut acc, step| {
                acc.record(step);
                acc
            })
    }

    /// Counts for every prefix of the trace, in one pass.
    ///
    /// Element `i` equals `Progress::at(trace, i)`.
    #[must_use]
    pub fn prefixes(trace: &Trace) -> Vec<Self> {
        trace
            .steps()
            .iter()
            .scan(Self::default(), |acc, step| {
                acc.record(step);
                Some(*acc)
            })
            .collect()
    }

    fn record(&mut self, step: &Step) {
        self.steps_seen += 1;
        match step {
            Step::Banker(s) => match s.action {
                BankerAction::Executed => self.executed += 1,
                BankerAction::Deadlock => self.deadlocks += 1,
            },
            Step::Deadlock(s) => match s.action {
                DeadlockAction::Executed => self.executed += 1,
                DeadlockAction::Waiting => self.waiting += 1,
            },
            Step::Memory(s) => {
                if s.page_fault {
                    self.page_faults += 1;
                } else {
                    self.hits += 1;
                }
            }
        }
    }

    /// Fault ratio so far (0.0 for non-memory traces).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fault_rate(&self) -> f64 {
        let refs = self.page_faults + self.hits;
        if refs == 0 {
            0.0
        } else {
            self.page_faults as f64 / refs as f64
        }
    }
}
