// crates/ostrace-cli/src/adapters.rs

//! Terminal and pipeline renderings of a [`StepView`].

use ostrace_core::{
    BankerAction, DeadlockAction, Edge, FrameSlot, MemoryStep, PresentationAdapter, ProcessId,
    RenderError, Step, StepView, Summary,
};
use std::io::Write;

/// Human-readable lines, one block per step.
#[derive(Debug)]
pub struct TextAdapter<W: Write> {
    out: W,
}

impl<W: Write> TextAdapter<W> {
    /// Write to `out`.
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> PresentationAdapter for TextAdapter<W> {
    fn render(&mut self, view: &StepView<'_>) -> Result<(), RenderError> {
        writeln!(self.out, "{}", describe_step(view))?;
        if view.is_terminal() {
            if let Some(summary) = view.summary {
                writeln!(self.out, "{}", describe_summary(summary))?;
                if let Summary::Deadlock(s) = summary {
                    for line in describe_graph(view.topology, &s.deadlocked_processes) {
                        writeln!(self.out, "{line}")?;
                    }
                }
            }
        }
        self.out.flush()?;
        Ok(())
    }
}

/// One JSON object per render (NDJSON).
#[derive(Debug)]
pub struct JsonLinesAdapter<W: Write> {
    out: W,
    lines: usize,
}

impl<W: Write> JsonLinesAdapter<W> {
    /// Write to `out`.
    pub const fn new(out: W) -> Self {
        Self { out, lines: 0 }
    }

    /// Lines written so far.
    pub const fn lines(&self) -> usize {
        self.lines
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> PresentationAdapter for JsonLinesAdapter<W> {
    fn render(&mut self, view: &StepView<'_>) -> Result<(), RenderError> {
        serde_json::to_writer(&mut self.out, view)?;
        self.out.write_all(b"\n")?;
        self.lines += 1;
        Ok(())
    }
}

/// `Step n/N: ...` line for one view.
#[must_use]
pub fn describe_step(view: &StepView<'_>) -> String {
    let body = match view.step {
        Step::Banker(s) => match (s.action, &s.process) {
            (BankerAction::Executed, Some(p)) => format!("Process {p} executed → Work: {:?}", s.work),
            (BankerAction::Executed, None) => format!("executed → Work: {:?}", s.work),
            (BankerAction::Deadlock, _) => {
                format!("Deadlock: no process can proceed (Work: {:?})", s.work)
            }
        },
        Step::Deadlock(s) => {
            let verb = match s.action {
                DeadlockAction::Executed => "executed",
                DeadlockAction::Waiting => "waiting",
            };
            format!(
                "Process {} {verb}, Work: {:?} → {:?}",
                s.process, s.work_before, s.work_after
            )
        }
        Step::Memory(s) => describe_reference(s, view),
    };
    format!("Step {}/{}: {body}", view.index + 1, view.last_index + 1)
}

fn describe_reference(s: &MemoryStep, view: &StepView<'_>) -> String {
    let mut text = format!("Visiting Page {}", s.reference);
    if let Some(pid) = s.process {
        text.push_str(&format!(" (P{pid})"));
    }
    if s.page_fault {
        text.push_str(if s.has_free_frame() {
            " -> Page Fault, empty frame was available"
        } else {
            " -> Page Fault, memory was full, page replaced"
        });
    } else {
        match s.frame_of_reference() {
            Some(j) => text.push_str(&format!(" -> Hit in frame {j}")),
            None => text.push_str(" -> Hit"),
        }
    }
    let frames: Vec<String> = s.frames.iter().map(FrameSlot::to_string).collect();
    let p = view.progress;
    text.push_str(&format!(
        "  [{}]  faults {}/{} ({:.0}%)",
        frames.join(" "),
        p.page_faults,
        p.page_faults + p.hits,
        p.fault_rate() * 100.0
    ));
    text
}

/// Role of a RAG node in the final graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeRole {
    /// A deadlocked process.
    Cycle,
    /// Any other process node (`P...`).
    Process,
    /// A resource node.
    Resource,
}

impl NodeRole {
    /// Classify `label` against the deadlocked set.
    #[must_use]
    pub fn of(label: &str, deadlocked: &[ProcessId]) -> Self {
        if deadlocked.iter().any(|p| p.matches_node(label)) {
            Self::Cycle
        } else if label.starts_with('P') {
            Self::Process
        } else {
            Self::Resource
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Cycle => "cycle",
            Self::Process => "process",
            Self::Resource => "resource",
        }
    }
}

/// RAG listing with each edge end tagged by [`NodeRole`]; empty without edges.
#[must_use]
pub fn describe_graph(edges: &[Edge], deadlocked: &[ProcessId]) -> Vec<String> {
    if edges.is_empty() {
        return Vec::new();
    }
    let tag = |label: &str| format!("{label} ({})", NodeRole::of(label, deadlocked).as_str());
    std::iter::once("Resource-allocation graph:".to_owned())
        .chain(
            edges
                .iter()
                .map(|e| format!("  {} -> {}", tag(&e.from), tag(&e.to))),
        )
        .collect()
}

/// Terminal outcome line.
#[must_use]
pub fn describe_summary(summary: &Summary) -> String {
    match summary {
        Summary::Banker(s) if s.safe => {
            let seq: Vec<String> = s.safe_sequence.iter().map(ToString::to_string).collect();
            format!("System is SAFE. Safe Sequence: {}", seq.join(" -> "))
        }
        Summary::Banker(_) => "System is UNSAFE".to_owned(),
        Summary::Deadlock(s) if s.deadlock_detected => {
            let procs: Vec<String> = s
                .deadlocked_processes
                .iter()
                .map(ToString::to_string)
                .collect();
            format!("Deadlock detected: {}", procs.join(", "))
        }
        Summary::Deadlock(_) => "No deadlock detected".to_owned(),
        Summary::Memory(s) => format!("Page Faults: {}  Hits: {}", s.total_page_faults, s.hits),
    }
}
