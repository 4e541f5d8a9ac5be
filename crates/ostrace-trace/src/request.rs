// crates/ostrace-trace/src/request.rs

//! Run request documents handed to the external algorithm process.
//!
//! The producer is invoked as `<producer> <input> <output>` and reads one of
//! these from `<input>`. `mode` selects which parameter block it looks at.

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

use anyhow::{ensure, Context, Result};
use ostrace_core::{Edge, TraceKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::format::{TopologyDocument, TopologySection};

/// Input document for one producer run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    /// Which algorithm to run.
    pub mode: TraceKind,
    /// Parameters for `BANKER`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banker: Option<BankerParams>,
    /// Parameters for `DEADLOCK`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadlock: Option<DeadlockParams>,
    /// Parameters for `MEMORY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryParams>,
}

/// Banker's algorithm matrices.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankerParams {
    /// Process count (rows).
    pub processes: usize,
    /// Resource type count (columns).
    pub resources: usize,
    /// Current allocation, `processes × resources`.
    pub allocation: Vec<Vec<u64>>,
    /// Maximum claim, `processes × resources`.
    pub max: Vec<Vec<u64>>,
    /// Free instances per resource type.
    pub available: Vec<u64>,
}

/// Resource-allocation graph for deadlock detection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlockParams {
    /// Directed edges; `P→R` is a request, `R→P` an assignment.
    pub edges: Vec<Edge>,
    /// Optional matrix form for matrix-based detectors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocation: Option<Vec<Vec<u64>>>,
    /// Outstanding requests, same shape as `allocation`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<Vec<Vec<u64>>>,
    /// Free instances per resource type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<Vec<u64>>,
}

/// Page replacement policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReplacementAlgorithm {
    /// First in, first out.
    Fifo,
    /// Least recently used.
    Lru,
    /// Belady's optimal.
    Optimal,
}

/// Page replacement run parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryParams {
    /// Physical frame count.
    pub frames: usize,
    /// Replacement policy.
    pub algorithm: ReplacementAlgorithm,
    /// Page reference string.
    pub references: Vec<u64>,
    /// Per-process page counts, when references are attributed to owners.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub processes: Vec<ProcessPages>,
}

/// Page count of one process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessPages {
    /// Process id.
    pub pid: u64,
    /// Pages owned.
    pub pages: u64,
}

impl RunRequest {
    /// The stock demo input for `kind`.
    #[must_use]
    pub fn demo(kind: TraceKind) -> Self {
        let mut req = Self {
            mode: kind,
            banker: None,
            deadlock: None,
            memory: None,
        };
        match kind {
            TraceKind::Banker => {
                req.banker = Some(BankerParams {
                    processes: 5,
                    resources: 3,
                    allocation: vec![
                        vec![0, 1, 0],
                        vec![2, 0, 0],
                        vec![3, 0, 2],
                        vec![2, 1, 1],
                        vec![0, 0, 2],
                    ],
                    max: vec![
                        vec![7, 5, 3],
                        vec![3, 2, 2],
                        vec![9, 0, 2],
                        vec![2, 2, 2],
                        vec![4, 3, 3],
                    ],
                    available: vec![3, 3, 2],
                });
            }
            TraceKind::Deadlock => {
                req.deadlock = Some(DeadlockParams {
                    edges: vec![
                        Edge::new("P1", "R1"),
                        Edge::new("R1", "P2"),
                        Edge::new("P2", "R1"),
                    ],
                    allocation: None,
                    request: None,
                    available: None,
                });
            }
            TraceKind::Memory => {
                req.memory = Some(MemoryParams {
                    frames: 3,
                    algorithm: ReplacementAlgorithm::Lru,
                    references: vec![7, 0, 1, 2, 0, 3, 0, 4, 2, 3, 0, 3, 2, 1, 2, 0, 1, 7, 0, 1],
                    processes: Vec::new(),
                });
            }
        }
        req
    }

    /// Check that the block for `mode` is present and well-formed.
    pub fn validate(&self) -> Result<()> {
        match self.mode {
            TraceKind::Banker => self
                .banker
                .as_ref()
                .context("BANKER request has no `banker` block")?
                .validate(),
            TraceKind::Deadlock => self
                .deadlock
                .as_ref()
                .context("DEADLOCK request has no `deadlock` block")?
                .validate(),
            TraceKind::Memory => self
                .memory
                .as_ref()
                .context("MEMORY request has no `memory` block")?
                .validate(),
        }
    }

    /// The RAG topology carried by a DEADLOCK request.
    #[must_use]
    pub fn topology(&self) -> Option<TopologyDocument> {
        self.deadlock.as_ref().map(|d| TopologyDocument {
            deadlock: TopologySection {
                edges: d.edges.clone(),
            },
        })
    }
}

impl BankerParams {
    fn validate(&self) -> Result<()> {
        ensure!(self.processes > 0, "banker: processes must be positive");
        ensure!(self.resources > 0, "banker: resources must be positive");
        ensure!(
            self.available.len() == self.resources,
            "banker: available has {} entries, expected {}",
            self.available.len(),
            self.resources
        );
        check_matrix("banker: allocation", &self.allocation, self.processes, self.resources)?;
        check_matrix("banker: max", &self.max, self.processes, self.resources)?;
        for (i, (alloc, max)) in self.allocation.iter().zip(&self.max).enumerate() {
            ensure!(
                alloc.iter().zip(max).all(|(a, m)| a <= m),
                "banker: process {i} holds more than its maximum claim"
            );
        }
        Ok(())
    }
}

impl DeadlockParams {
    fn validate(&self) -> Result<()> {
        ensure!(!self.edges.is_empty(), "deadlock: edge list is empty");
        for (i, e) in self.edges.iter().enumerate() {
            ensure!(
                !e.from.is_empty() && !e.to.is_empty(),
                "deadlock: edge {i} has an empty endpoint"
            );
        }
        if let (Some(alloc), Some(req)) = (&self.allocation, &self.request) {
            ensure!(
                alloc.len() == req.len(),
                "deadlock: allocation and request have different row counts"
            );
            let cols = alloc.first().map_or(0, Vec::len);
            check_matrix("deadlock: allocation", alloc, alloc.len(), cols)?;
            check_matrix("deadlock: request", req, req.len(), cols)?;
            if let Some(avail) = &self.available {
                ensure!(
                    avail.len() == cols,
                    "deadlock: available has {} entries, expected {cols}",
                    avail.len()
                );
            }
        }
        Ok(())
    }
}

impl MemoryParams {
    fn validate(&self) -> Result<()> {
        ensure!(self.frames > 0, "memory: frames must be positive");
        ensure!(!self.references.is_empty(), "memory: reference string is empty");
        let mut seen = HashSet::new();
        for p in &self.processes {
            ensure!(seen.insert(p.pid), "memory: duplicate pid {}", p.pid);
        }
        Ok(())
    }
}

fn check_matrix(what: &str, m: &[Vec<u64>], rows: usize, cols: usize) -> Result<()> {
    ensure!(m.len() == rows, "{what} has {} rows, expected {rows}", m.len());
    if let Some(i) = m.iter().position(|r| r.len() != cols) {
        anyhow::bail!("{what} row {i} has {} columns, expected {cols}", m[i].len());
    }
    Ok(())
}
