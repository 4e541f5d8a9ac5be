//! Canonical trace model used across the OSTRACE workspace.
//!
//! A [`Trace`] is built once by the loader and is read-only afterwards. Steps and
//! summaries are closed enums tagged by [`TraceKind`]; every consumer matches on
//! them exhaustively.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::TraceError;

/// Which algorithm produced a trace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TraceKind {
    /// Banker's safety algorithm.
    Banker,
    /// Deadlock detection over a resource-allocation graph.
    Deadlock,
    /// Page-replacement simulation.
    Memory,
}

impl TraceKind {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 3] = [Self::Banker, Self::Deadlock, Self::Memory];

    /// Upper-case wire name (`BANKER`, `DEADLOCK`, `MEMORY`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Banker => "BANKER",
            Self::Deadlock => "DEADLOCK",
            Self::Memory => "MEMORY",
        }
    }
}

impl fmt::Display for TraceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TraceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown trace kind: {s} (expected BANKER, DEADLOCK or MEMORY)"))
    }
}

/// Process identifier as emitted by producers: an index or a label.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProcessId {
    /// Numeric process index (`P<n>` when displayed).
    Index(u64),
    /// Free-form label such as `"P3"`.
    Name(String),
}

impl ProcessId {
    /// Whether this process is the graph node labelled `label`.
    ///
    /// `Index(n)` matches `"n"` and `"P<n>"`; `Name(s)` matches `s` exactly.
    #[must_use]
    pub fn matches_node(&self, label: &str) -> bool {
        match self {
            Self::Index(n) => {
                let digits = label.strip_prefix('P').unwrap_or(label);
                digits.parse::<u64>().is_ok_and(|v| v == *n)
            }
            Self::Name(s) => s == label,
        }
    }

    /// Whether two ids name the same process (`Index(1)` and `Name("P1")` do).
    #[must_use]
    pub fn same_process(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Index(a), Self::Index(b)) => a == b,
            (Self::Name(a), Self::Name(b)) => a == b,
            (idx @ Self::Index(_), Self::Name(label)) | (Self::Name(label), idx @ Self::Index(_)) => {
                idx.matches_node(label)
            }
        }
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(n) => write!(f, "P{n}"),
            Self::Name(s) => f.write_str(s),
        }
    }
}

/// Available-resource vector (length = resource count).
pub type WorkVector = Vec<u64>;

/// Outcome recorded for one Banker's step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BankerAction {
    /// The process could run and released its allocation.
    Executed,
    /// No remaining process could run.
    Deadlock,
}

impl BankerAction {
    /// Parse the producer's action tag.
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "executed" => Some(Self::Executed),
            "deadlock" => Some(Self::Deadlock),
            _ => None,
        }
    }
}

/// Outcome recorded for one deadlock-detection step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeadlockAction {
    /// Request satisfied; allocation released.
    Executed,
    /// Request could not be satisfied this pass.
    Waiting,
}

impl DeadlockAction {
    /// Parse the producer's action tag.
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "executed" => Some(Self::Executed),
            "waiting" => Some(Self::Waiting),
            _ => None,
        }
    }
}

/// One Banker's step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BankerStep {
    /// Process that ran; absent on a bare deadlock record.
    pub process: Option<ProcessId>,
    /// Work vector after the step.
    pub work: WorkVector,
    /// What happened.
    pub action: BankerAction,
}

/// One deadlock-detection step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeadlockStep {
    /// Process examined.
    pub process: ProcessId,
    /// What happened.
    pub action: DeadlockAction,
    /// Work vector before the examination.
    pub work_before: WorkVector,
    /// Work vector after the examination.
    pub work_after: WorkVector,
}

/// Content of one physical frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameSlot {
    /// Nothing loaded (`-1` on the wire).
    Empty,
    /// Page number held by the frame.
    Page(u64),
}

impl FrameSlot {
    /// Wire sentinel for an empty frame.
    pub const EMPTY_SENTINEL: i64 = -1;

    /// Page held, if any.
    #[must_use]
    pub const fn page(self) -> Option<u64> {
        match self {
            Self::Empty => None,
            Self::Page(p) => Some(p),
        }
    }
}

impl Serialize for FrameSlot {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Empty => s.serialize_i64(Self::EMPTY_SENTINEL),
            Self::Page(p) => s.serialize_u64(*p),
        }
    }
}

impl fmt::Display for FrameSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("-"),
            Self::Page(p) => write!(f, "{p}"),
        }
    }
}

/// One page reference.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MemoryStep {
    /// Owner of the reference, when the producer tracks it.
    pub process: Option<u64>,
    /// Referenced page.
    pub reference: u64,
    /// Frame contents after the reference (length = frame count).
    pub frames: Vec<FrameSlot>,
    /// Whether the reference faulted.
    pub page_fault: bool,
}

impl MemoryStep {
    /// Whether any frame is still empty after this step.
    #[must_use]
    pub fn has_free_frame(&self) -> bool {
        self.frames.contains(&FrameSlot::Empty)
    }

    /// Index of the frame holding the referenced page.
    #[must_use]
    pub fn frame_of_reference(&self) -> Option<usize> {
        self.frames
            .iter()
            .position(|f| *f == FrameSlot::Page(self.reference))
    }
}

/// One recorded step, tagged by algorithm.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "UPPERCASE")]
pub enum Step {
    /// Banker's step.
    Banker(BankerStep),
    /// Deadlock-detection step.
    Deadlock(DeadlockStep),
    /// Page-replacement step.
    Memory(MemoryStep),
}

impl Step {
    /// Algorithm tag.
    #[must_use]
    pub const fn kind(&self) -> TraceKind {
        match self {
            Self::Banker(_) => TraceKind::Banker,
            Self::Deadlock(_) => TraceKind::Deadlock,
            Self::Memory(_) => TraceKind::Memory,
        }
    }
}

/// Banker's terminal result, inferred from the steps.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BankerSummary {
    /// No deadlock record was emitted.
    pub safe: bool,
    /// Executed processes in order (the safe sequence when `safe`).
    pub safe_sequence: Vec<ProcessId>,
}

/// Deadlock-detection terminal result (the trailing summary record).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeadlockSummary {
    /// Whether any process stayed blocked.
    pub deadlock_detected: bool,
    /// Processes left waiting.
    pub deadlocked_processes: Vec<ProcessId>,
}

/// Page-replacement totals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct MemorySummary {
    /// Declared fault count.
    pub total_page_faults: u64,
    /// References that hit (steps minus faults).
    pub hits: u64,
}

/// Terminal result of a run, tagged by algorithm.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "UPPERCASE")]
pub enum Summary {
    /// Banker's result.
    Banker(BankerSummary),
    /// Deadlock-detection result.
    Deadlock(DeadlockSummary),
    /// Page-replacement result.
    Memory(MemorySummary),
}

impl Summary {
    /// Algorithm tag.
    #[must_use]
    pub const fn kind(&self) -> TraceKind {
        match self {
            Self::Banker(_) => TraceKind::Banker,
            Self::Deadlock(_) => TraceKind::Deadlock,
            Self::Memory(_) => TraceKind::Memory,
        }
    }
}

/// Directed edge of the resource-allocation graph (render-only topology).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Source node label.
    pub from: String,
    /// Target node label.
    pub to: String,
}

impl Edge {
    /// Construct an edge.
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// One immutable recorded run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trace {
    kind: TraceKind,
    steps: Vec<Step>,
    summary: Summary,
    topology: Vec<Edge>,
    warnings: Vec<TraceError>,
}

impl Trace {
    /// Assemble a trace, enforcing that it is non-empty and homogeneous in kind.
    pub fn from_parts(
        kind: TraceKind,
        steps: Vec<Step>,
        summary: Summary,
        topology: Vec<Edge>,
    ) -> Result<Self, TraceError> {
        if steps.is_empty() {
            return Err(TraceError::EmptyTrace { kind });
        }
        if let Some(i) = steps.iter().position(|s| s.kind() != kind) {
            return Err(TraceError::SchemaMismatch {
                kind,
                detail: format!("step {i} is a {} step", steps[i].kind()),
            });
        }
        if summary.kind() != kind {
            return Err(TraceError::SchemaMismatch {
                kind,
                detail: format!("summary is a {} summary", summary.kind()),
            });
        }
        Ok(Self {
            kind,
            steps,
            summary,
            topology,
            warnings: Vec::new(),
        })
    }

    /// Attach non-fatal findings recorded during a lenient load.
    #[must_use]
    pub fn with_warnings(mut self, warnings: Vec<TraceError>) -> Self {
        self.warnings = warnings;
        self
    }

    /// Algorithm tag.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> TraceKind {
        self.kind
    }

    /// All steps in run order.
    #[inline]
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Number of steps (always ≥ 1).
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the trace has no steps.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Index of the final step.
    #[inline]
    #[must_use]
    pub fn last_index(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }

    /// Step at `index`.
    #[inline]
    #[must_use]
    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    /// Terminal result.
    #[inline]
    #[must_use]
    pub const fn summary(&self) -> &Summary {
        &self.summary
    }

    /// RAG edges (empty unless a DEADLOCK trace was loaded with topology).
    #[inline]
    #[must_use]
    pub fn topology(&self) -> &[Edge] {
        &self.topology
    }

    /// Findings downgraded to warnings by a lenient load.
    #[inline]
    #[must_use]
    pub fn warnings(&self) -> &[TraceError] {
        &self.warnings
    }
}
