// crates/ostrace-trace/src/load.rs

//! Loader/validator: parsed document → immutable [`Trace`].
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. the document is present (`ArtifactNotFound`),
//! 2. its top-level shape matches the expected kind (`SchemaMismatch`),
//! 3. it holds at least one step (`EmptyTrace`),
//! 4. every per-step vector has the trace-wide length and no negative
//!    component (`InconsistentShape`, first offending step),
//! 5. every action tag is known (`UnknownAction`),
//! 6. the summary agrees with the steps (`SummaryMismatch`; a warning under
//!    [`Validation::Lenient`]),
//! 7. DEADLOCK only, when topology is supplied: every deadlocked process is a
//!    node of the resource-allocation graph (`DanglingCycleNode`).
//!
//! No I/O happens here; see [`crate::io`] for the file-backed entry point.

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

use ostrace_core::{
    BankerAction, BankerStep, BankerSummary, DeadlockAction, DeadlockStep, DeadlockSummary, Edge,
    FrameSlot, MemoryStep, MemorySummary, Step, Summary, Trace, TraceError, TraceKind,
    WorkVector,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::format::{
    BankerRecord, DeadlockRecord, DeadlockSummaryRecord, MemoryDocument, MemoryRecord,
    TopologyDocument,
};

/// How summary inconsistencies are treated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Validation {
    /// `SummaryMismatch` aborts the load.
    #[default]
    Strict,
    /// `SummaryMismatch` is logged and kept in `Trace::warnings`.
    Lenient,
}

impl FromStr for Validation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            other => Err(format!("unknown validation mode: {other} (expected strict or lenient)")),
        }
    }
}

/// Options for one load.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoadOptions<'a> {
    /// Strict or lenient summary checking.
    pub validation: Validation,
    /// Auxiliary RAG topology document (DEADLOCK only).
    pub topology: Option<&'a Value>,
}

impl<'a> LoadOptions<'a> {
    /// Options with the given validation mode and no topology.
    #[must_use]
    pub const fn new(validation: Validation) -> Self {
        Self {
            validation,
            topology: None,
        }
    }

    /// Attach a topology document.
    #[must_use]
    pub const fn with_topology(mut self, topology: &'a Value) -> Self {
        self.topology = Some(topology);
        self
    }
}

/// Validate `doc` as a trace of kind `expected`.
///
/// `doc` is `None` when the host could not find the artifact; JSON `null`
/// is treated the same way.
pub fn load(
    doc: Option<&Value>,
    expected: TraceKind,
    opts: &LoadOptions<'_>,
) -> Result<Trace, TraceError> {
    let doc = match doc {
        Some(v) if !v.is_null() => v,
        _ => {
            return Err(TraceError::ArtifactNotFound {
                what: format!("{expected} trace document"),
            })
        }
    };

    let trace = match expected {
        TraceKind::Banker => load_banker(doc, opts),
        TraceKind::Deadlock => load_deadlock(doc, opts),
        TraceKind::Memory => load_memory(doc, opts),
    }?;
    debug!(
        kind = %trace.kind(),
        steps = trace.len(),
        warnings = trace.warnings().len(),
        "trace loaded"
    );
    Ok(trace)
}

/* ---------------- BANKER ---------------- */

fn load_banker(doc: &Value, opts: &LoadOptions<'_>) -> Result<Trace, TraceError> {
    const KIND: TraceKind = TraceKind::Banker;
    let records: Vec<BankerRecord> = decode_elements(doc, KIND)?;
    non_empty(&records, KIND)?;

    // Shape: declared work vectors share one width; a bare deadlock record
    // carries the previous vector forward, so it cannot come first unless no
    // record declares a vector at all.
    let width = records.iter().find_map(|r| r.work.as_ref().map(Vec::len));
    let mut works: Vec<WorkVector> = Vec::with_capacity(records.len());
    let mut prev = WorkVector::new();
    for (i, r) in records.iter().enumerate() {
        let work = match &r.work {
            Some(w) => check_vector(i, "work", w, width)?,
            None if r.action == "executed" => {
                return Err(TraceError::InconsistentShape {
                    index: i,
                    detail: "executed record has no work vector".into(),
                })
            }
            None if works.is_empty() && width.is_some() => {
                return Err(TraceError::InconsistentShape {
                    index: i,
                    detail: format!(
                        "deadlock record has no work vector and no earlier step to carry one from (expected length {})",
                        width.unwrap_or_default()
                    ),
                })
            }
            None => prev.clone(),
        };
        if r.action == "executed" && r.process.is_none() {
            return Err(TraceError::InconsistentShape {
                index: i,
                detail: "executed record has no process".into(),
            });
        }
        prev.clone_from(&work);
        works.push(work);
    }

    let actions = parse_actions(&records, |r| &r.action, BankerAction::parse)?;

    let mut findings = Vec::new();
    let last = records.len() - 1;
    if let Some(i) = actions
        .iter()
        .position(|a| *a == BankerAction::Deadlock)
        .filter(|i| *i != last)
    {
        findings.push(TraceError::SummaryMismatch {
            index: Some(i),
            detail: format!("deadlock recorded at step {i} but the run continues to step {last}"),
        });
    }
    let warnings = settle(findings, opts.validation)?;

    let summary = BankerSummary {
        safe: !actions.contains(&BankerAction::Deadlock),
        safe_sequence: records
            .iter()
            .zip(&actions)
            .filter(|(_, a)| **a == BankerAction::Executed)
            .filter_map(|(r, _)| r.process.clone())
            .collect(),
    };
    let steps = records
        .into_iter()
        .zip(works)
        .zip(actions)
        .map(|((r, work), action)| {
            Step::Banker(BankerStep {
                process: r.process,
                work,
                action,
            })
        })
        .collect();

    ignore_topology(KIND, opts);
    Ok(Trace::from_parts(KIND, steps, Summary::Banker(summary), Vec::new())?.with_warnings(warnings))
}

/* ---------------- DEADLOCK ---------------- */

fn load_deadlock(doc: &Value, opts: &LoadOptions<'_>) -> Result<Trace, TraceError> {
    const KIND: TraceKind = TraceKind::Deadlock;
    let Some(elements) = doc.as_array() else {
        return Err(schema(KIND, format!("expected an array, found {}", type_name(doc))));
    };
    // Producer quirk: the last element is the summary, not a step.
    let Some((summary_value, step_values)) = elements.split_last() else {
        return Err(schema(KIND, "missing trailing summary record"));
    };
    let summary_record: DeadlockSummaryRecord = serde_json::from_value(summary_value.clone())
        .map_err(|e| schema(KIND, format!("summary record: {e}")))?;
    let records: Vec<DeadlockRecord> = step_values
        .iter()
        .enumerate()
        .map(|(i, v)| decode_element(v, i, KIND))
        .collect::<Result<_, _>>()?;
    non_empty(&records, KIND)?;

    let width = records.first().map(|r| r.work_before.len());
    let mut vectors = Vec::with_capacity(records.len());
    for (i, r) in records.iter().enumerate() {
        let before = check_vector(i, "work_before", &r.work_before, width)?;
        let after = check_vector(i, "work_after", &r.work_after, width)?;
        vectors.push((before, after));
    }

    let actions = parse_actions(&records, |r| &r.action, DeadlockAction::parse)?;

    let findings = deadlock_findings(&records, &actions, &summary_record);
    let warnings = settle(findings, opts.validation)?;

    let topology = match opts.topology {
        Some(v) => {
            let edges = decode_topology(v)?;
            if let Some(p) = summary_record
                .deadlocked_processes
                .iter()
                .find(|p| !edges.iter().any(|e| p.matches_node(&e.from) || p.matches_node(&e.to)))
            {
                return Err(TraceError::DanglingCycleNode {
                    node: p.to_string(),
                });
            }
            edges
        }
        None => Vec::new(),
    };

    let steps = records
        .into_iter()
        .zip(vectors)
        .zip(actions)
        .map(|((r, (work_before, work_after)), action)| {
            Step::Deadlock(DeadlockStep {
                process: r.process,
                action,
                work_before,
                work_after,
            })
        })
        .collect();
    let summary = Summary::Deadlock(DeadlockSummary {
        deadlock_detected: summary_record.deadlock_detected,
        deadlocked_processes: summary_record.deadlocked_processes,
    });
    Ok(Trace::from_parts(KIND, steps, summary, topology)?.with_warnings(warnings))
}

fn deadlock_findings(
    records: &[DeadlockRecord],
    actions: &[DeadlockAction],
    summary: &DeadlockSummaryRecord,
) -> Vec<TraceError> {
    let mut findings = Vec::new();
    if summary.deadlock_detected == summary.deadlocked_processes.is_empty() {
        findings.push(TraceError::SummaryMismatch {
            index: None,
            detail: format!(
                "deadlock_detected is {} but {} process(es) are listed as deadlocked",
                summary.deadlock_detected,
                summary.deadlocked_processes.len()
            ),
        });
    }
    for p in &summary.deadlocked_processes {
        let last_seen = records
            .iter()
            .zip(actions)
            .enumerate()
            .rev()
            .find(|(_, (r, _))| r.process.same_process(p));
        match last_seen {
            None => findings.push(TraceError::SummaryMismatch {
                index: None,
                detail: format!("deadlocked process {p} never appears in the steps"),
            }),
            Some((i, (_, DeadlockAction::Executed))) => {
                findings.push(TraceError::SummaryMismatch {
                    index: Some(i),
                    detail: format!("deadlocked process {p} last executed at step {i}"),
                });
            }
            Some((_, (_, DeadlockAction::Waiting))) => {}
        }
    }
    findings
}

fn decode_topology(v: &Value) -> Result<Vec<Edge>, TraceError> {
    let doc: TopologyDocument = serde_json::from_value(v.clone())
        .map_err(|e| schema(TraceKind::Deadlock, format!("topology document: {e}")))?;
    Ok(doc.deadlock.edges)
}

/* ---------------- MEMORY ---------------- */

fn load_memory(doc: &Value, opts: &LoadOptions<'_>) -> Result<Trace, TraceError> {
    const KIND: TraceKind = TraceKind::Memory;
    if !doc.is_object() {
        return Err(schema(KIND, format!("expected an object, found {}", type_name(doc))));
    }
    let parsed: MemoryDocument =
        serde_json::from_value(doc.clone()).map_err(|e| schema(KIND, e.to_string()))?;
    non_empty(&parsed.steps, KIND)?;

    let frame_count = parsed.steps[0].frames.len();
    let mut decoded = Vec::with_capacity(parsed.steps.len());
    for (i, r) in parsed.steps.iter().enumerate() {
        let (process, reference) = check_reference(i, r)?;
        decoded.push((process, reference, check_frames(i, r, frame_count)?));
    }

    let counted = parsed.steps.iter().filter(|r| r.page_fault).count() as u64;
    let mut findings = Vec::new();
    if counted != parsed.total_page_faults {
        findings.push(TraceError::SummaryMismatch {
            index: None,
            detail: format!(
                "total_page_faults is {} but {counted} step(s) have page_fault = true",
                parsed.total_page_faults
            ),
        });
    }
    let warnings = settle(findings, opts.validation)?;

    let hits = parsed.steps.len() as u64 - counted;
    let summary = Summary::Memory(MemorySummary {
        total_page_faults: parsed.total_page_faults,
        hits,
    });
    let steps = parsed
        .steps
        .into_iter()
        .zip(decoded)
        .map(|(r, (process, reference, frames))| {
            Step::Memory(MemoryStep {
                process,
                reference,
                frames,
                page_fault: r.page_fault,
            })
        })
        .collect();

    ignore_topology(KIND, opts);
    Ok(Trace::from_parts(KIND, steps, summary, Vec::new())?.with_warnings(warnings))
}

fn check_reference(index: usize, r: &MemoryRecord) -> Result<(Option<u64>, u64), TraceError> {
    let non_negative = |field: &str, v: i64| {
        u64::try_from(v).map_err(|_| TraceError::InconsistentShape {
            index,
            detail: format!("{field} is {v}, expected a non-negative integer"),
        })
    };
    let process = r.process.map(|p| non_negative("process", p)).transpose()?;
    Ok((process, non_negative("reference", r.reference)?))
}

fn check_frames(index: usize, r: &MemoryRecord, expected: usize) -> Result<Vec<FrameSlot>, TraceError> {
    if r.frames.len() != expected {
        return Err(TraceError::InconsistentShape {
            index,
            detail: format!("frames has length {}, expected {expected}", r.frames.len()),
        });
    }
    r.frames
        .iter()
        .enumerate()
        .map(|(j, f)| match *f {
            None | Some(FrameSlot::EMPTY_SENTINEL) => Ok(FrameSlot::Empty),
            Some(v) => u64::try_from(v)
                .map(FrameSlot::Page)
                .map_err(|_| TraceError::InconsistentShape {
                    index,
                    detail: format!("frames[{j}] holds invalid page {v}"),
                }),
        })
        .collect()
}

/* ---------------- Shared helpers ---------------- */

fn decode_elements<T: DeserializeOwned>(doc: &Value, kind: TraceKind) -> Result<Vec<T>, TraceError> {
    let Some(elements) = doc.as_array() else {
        return Err(schema(kind, format!("expected an array, found {}", type_name(doc))));
    };
    elements
        .iter()
        .enumerate()
        .map(|(i, v)| decode_element(v, i, kind))
        .collect()
}

fn decode_element<T: DeserializeOwned>(v: &Value, i: usize, kind: TraceKind) -> Result<T, TraceError> {
    serde_json::from_value(v.clone()).map_err(|e| schema(kind, format!("element {i}: {e}")))
}

fn non_empty<T>(records: &[T], kind: TraceKind) -> Result<(), TraceError> {
    if records.is_empty() {
        return Err(TraceError::EmptyTrace { kind });
    }
    Ok(())
}

fn check_vector(
    index: usize,
    field: &str,
    raw: &[i64],
    width: Option<usize>,
) -> Result<WorkVector, TraceError> {
    if let Some(w) = width {
        if raw.len() != w {
            return Err(TraceError::InconsistentShape {
                index,
                detail: format!("{field} has length {}, expected {w}", raw.len()),
            });
        }
    }
    raw.iter()
        .enumerate()
        .map(|(j, v)| {
            u64::try_from(*v).map_err(|_| TraceError::InconsistentShape {
                index,
                detail: format!("{field}[{j}] is negative ({v})"),
            })
        })
        .collect()
}

fn parse_actions<R, A>(
    records: &[R],
    tag: impl Fn(&R) -> &String,
    parse: impl Fn(&str) -> Option<A>,
) -> Result<Vec<A>, TraceError> {
    records
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let t = tag(r);
            parse(t).ok_or_else(|| TraceError::UnknownAction {
                index: i,
                action: t.clone(),
            })
        })
        .collect()
}

/// Strict: first finding fails the load. Lenient: findings become warnings.
fn settle(findings: Vec<TraceError>, validation: Validation) -> Result<Vec<TraceError>, TraceError> {
    match validation {
        Validation::Strict => match findings.into_iter().next() {
            Some(e) => Err(e),
            None => Ok(Vec::new()),
        },
        Validation::Lenient => {
            for f in &findings {
                warn!(error = %f, "summary check failed; continuing (lenient)");
            }
            Ok(findings)
        }
    }
}

fn ignore_topology(kind: TraceKind, opts: &LoadOptions<'_>) {
    if opts.topology.is_some() {
        debug!(%kind, "topology supplied for a non-DEADLOCK trace; ignored");
    }
}

fn schema(kind: TraceKind, detail: impl Into<String>) -> TraceError {
    TraceError::SchemaMismatch {
        kind,
        detail: detail.into(),
    }
}

const fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
