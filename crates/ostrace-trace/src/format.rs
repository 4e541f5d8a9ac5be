// crates/ostrace-trace/src/format.rs

//! Serde mirrors of the documents exchanged with the external algorithm process.
//!
//! These types are loose: integers stay signed and action tags stay
//! strings so the loader can report negative components and unknown actions as
//! distinct, indexed errors instead of a generic decode failure.
//!
//! | kind     | top level                                   |
//! |----------|---------------------------------------------|
//! | BANKER   | `[BankerRecord, ...]`                       |
//! | DEADLOCK | `[DeadlockRecord, ..., DeadlockSummaryRecord]` |
//! | MEMORY   | `{ steps: [MemoryRecord, ...], total_page_faults }` |

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

use ostrace_core::{Edge, ProcessId};
use serde::{Deserialize, Serialize};

/// One element of a BANKER trace array.
///
/// The producer writes a bare `{ "action": "deadlock" }` when no process can
/// run, so `process` and `work` are optional.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BankerRecord {
    /// `"executed"` or `"deadlock"`.
    pub action: String,
    /// Process that ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process: Option<ProcessId>,
    /// Work vector after the step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work: Option<Vec<i64>>,
}

/// One step element of a DEADLOCK trace array.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeadlockRecord {
    /// Process examined.
    pub process: ProcessId,
    /// `"executed"` or `"waiting"`.
    pub action: String,
    /// Work before the examination.
    pub work_before: Vec<i64>,
    /// Work after the examination.
    pub work_after: Vec<i64>,
    /// Producer's request check; informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_run: Option<bool>,
}

/// Trailing summary element of a DEADLOCK trace array.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeadlockSummaryRecord {
    /// Whether any process stayed blocked.
    pub deadlock_detected: bool,
    /// Processes left blocked.
    pub deadlocked_processes: Vec<ProcessId>,
}

/// One element of a MEMORY trace's `steps`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemoryRecord {
    /// Owner of the reference, when tracked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process: Option<i64>,
    /// Referenced page.
    pub reference: i64,
    /// Frame contents after the reference; `-1` (or `null`) marks an empty frame.
    pub frames: Vec<Option<i64>>,
    /// Whether the reference faulted.
    pub page_fault: bool,
}

/// MEMORY trace document.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemoryDocument {
    /// Step records.
    pub steps: Vec<MemoryRecord>,
    /// Declared fault total.
    pub total_page_faults: u64,
}

/// Auxiliary RAG topology document: `{ deadlock: { edges: [...] } }`.
///
/// A DEADLOCK-mode run request has the same shape, so either can be passed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopologyDocument {
    /// Graph section.
    pub deadlock: TopologySection,
}

/// Edge list of the resource-allocation graph.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopologySection {
    /// Directed `(from, to)` pairs, in producer order.
    pub edges: Vec<Edge>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_deadlock_record_decodes() {
        let r: BankerRecord = serde_json::from_value(json!({ "action": "deadlock" })).unwrap();
        assert_eq!(r.process, None);
        assert_eq!(r.work, None);
    }

    #[test]
    fn deadlock_record_accepts_string_and_int_ids() {
        let a: DeadlockRecord = serde_json::from_value(json!({
            "process": 3, "action": "waiting", "work_before": [1], "work_after": [1], "can_run": false
        }))
        .unwrap();
        assert_eq!(a.process, ProcessId::Index(3));
        let b: DeadlockRecord = serde_json::from_value(json!({
            "process": "P3", "action": "waiting", "work_before": [1], "work_after": [1]
        }))
        .unwrap();
        assert_eq!(b.process, ProcessId::Name("P3".into()));
    }

    #[test]
    fn memory_frames_accept_null_and_sentinel() {
        let r: MemoryRecord = serde_json::from_value(json!({
            "process": 1, "reference": 7, "frames": [7, -1, null], "page_fault": true
        }))
        .unwrap();
        assert_eq!(r.frames, vec![Some(7), Some(-1), None]);
    }

    #[test]
    fn run_request_doubles_as_topology() {
        let doc = json!({
            "mode": "DEADLOCK",
            "deadlock": { "edges": [{ "from": "P1", "to": "R1" }] }
        });
        let t: TopologyDocument = serde_json::from_value(doc).unwrap();
        assert_eq!(t.deadlock.edges, vec![Edge::new("P1", "R1")]);
    }
}
