// crates/ostrace-trace/src/generator.rs

//! Seeded synthetic trace documents for tests and benches.
//!
//! Output is shape-valid wire JSON that loads under strict validation. The
//! numbers are plausible but nothing here runs the real algorithms.

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

use rand::seq::SliceRandom as _;
use rand::{rngs::StdRng, Rng as _, SeedableRng};
use serde_json::{json, Value};
use std::collections::VecDeque;

/// A generated DEADLOCK trace plus a topology document naming every process.
#[derive(Clone, Debug)]
pub struct DeadlockFixture {
    /// Step records followed by the summary record.
    pub trace: Value,
    /// `{ deadlock: { edges } }`.
    pub topology: Value,
}

/// Banker trace over `procs` processes and `res` resource types.
///
/// With `deadlock`, the run stops after about half the processes with a bare
/// deadlock record.
#[must_use]
pub fn generate_banker(procs: usize, res: usize, deadlock: bool, seed: u64) -> Value {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut order: Vec<usize> = (0..procs.max(1)).collect();
    order.shuffle(&mut rng);
    if deadlock {
        order.truncate(order.len() / 2);
    }

    let mut work: Vec<u64> = (0..res.max(1)).map(|_| rng.random_range(0..=4)).collect();
    let mut records = Vec::with_capacity(order.len() + 1);
    for p in order {
        for w in &mut work {
            *w += rng.random_range(0..=3);
        }
        records.push(json!({ "process": p, "action": "executed", "work": work }));
    }
    if deadlock {
        records.push(json!({ "action": "deadlock" }));
    }
    Value::Array(records)
}

/// Deadlock detection trace over `procs` processes and `res` resource types.
///
/// `blocked` processes (clamped to `procs`) end up waiting and are listed as
/// deadlocked; each is tied into a single request/assignment cycle.
#[must_use]
pub fn generate_deadlock(procs: usize, res: usize, blocked: usize, seed: u64) -> DeadlockFixture {
    let mut rng = StdRng::seed_from_u64(seed);
    let procs = procs.max(1);
    let blocked = blocked.min(procs);
    let mut ids: Vec<usize> = (0..procs).collect();
    ids.shuffle(&mut rng);
    let (stuck, free) = ids.split_at(blocked);

    let mut work: Vec<u64> = (0..res.max(1)).map(|_| rng.random_range(0..=3)).collect();
    let mut records = Vec::new();
    // Stuck processes are examined once per pass and never run.
    for p in stuck {
        records.push(waiting(*p, &work));
    }
    for p in free {
        let before = work.clone();
        for w in &mut work {
            *w += rng.random_range(0..=2);
        }
        records.push(json!({
            "process": p, "can_run": true, "action": "executed",
            "work_before": before, "work_after": work
        }));
    }
    for p in stuck {
        records.push(waiting(*p, &work));
    }
    records.push(json!({
        "deadlock_detected": !stuck.is_empty(),
        "deadlocked_processes": stuck
    }));

    let mut edges = Vec::new();
    for (i, p) in stuck.iter().enumerate() {
        let r = format!("R{i}");
        let next = stuck[(i + 1) % stuck.len()];
        edges.push(json!({ "from": format!("P{p}"), "to": r }));
        edges.push(json!({ "from": r, "to": format!("P{next}") }));
    }
    for p in free {
        edges.push(json!({ "from": "R0", "to": format!("P{p}") }));
    }

    DeadlockFixture {
        trace: Value::Array(records),
        topology: json!({ "deadlock": { "edges": edges } }),
    }
}

fn waiting(p: usize, work: &[u64]) -> Value {
    json!({
        "process": p, "can_run": false, "action": "waiting",
        "work_before": work, "work_after": work
    })
}

/// FIFO page replacement over a random reference string of `len` pages.
#[must_use]
pub fn generate_memory(len: usize, frames: usize, seed: u64) -> Value {
    let mut rng = StdRng::seed_from_u64(seed);
    let frames = frames.max(1);
    let page_space = (frames as u64) * 2 + 1;

    let mut slots: Vec<i64> = vec![-1; frames];
    let mut queue: VecDeque<usize> = VecDeque::with_capacity(frames);
    let mut steps = Vec::with_capacity(len);
    let mut faults = 0u64;
    for _ in 0..len {
        let page = rng.random_range(0..page_space);
        let resident = slots.iter().any(|s| u64::try_from(*s).is_ok_and(|v| v == page));
        if !resident {
            faults += 1;
            let slot = match slots.iter().position(|s| *s < 0) {
                Some(free) => free,
                None => queue.pop_front().unwrap_or(0),
            };
            slots[slot] = i64::try_from(page).unwrap_or(i64::MAX);
            queue.push_back(slot);
        }
        steps.push(json!({
            "reference": page,
            "frames": slots,
            "page_fault": !resident
        }));
    }
    json!({ "steps": steps, "total_page_faults": faults })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::{load, LoadOptions};
    use ostrace_core::{Summary, TraceKind};

    #[test]
    fn same_seed_same_document() {
        assert_eq!(generate_memory(50, 3, 7), generate_memory(50, 3, 7));
        assert_ne!(generate_memory(50, 3, 7), generate_memory(50, 3, 8));
    }

    #[test]
    fn generated_traces_load_strictly() {
        let opts = LoadOptions::default();
        let b = load(Some(&generate_banker(6, 3, true, 1)), TraceKind::Banker, &opts).unwrap();
        assert_eq!(b.len(), 4);

        let fx = generate_deadlock(5, 2, 2, 3);
        let d = load(
            Some(&fx.trace),
            TraceKind::Deadlock,
            &opts.with_topology(&fx.topology),
        )
        .unwrap();
        let Summary::Deadlock(s) = d.summary() else { panic!("deadlock summary expected") };
        assert_eq!(s.deadlocked_processes.len(), 2);

        let m = load(Some(&generate_memory(40, 4, 9)), TraceKind::Memory, &opts).unwrap();
        assert_eq!(m.len(), 40);
    }
}
