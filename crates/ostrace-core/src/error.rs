//! Error taxonomy for loading and replaying traces.

use thiserror::Error;

use crate::types::TraceKind;

/// Everything that can go wrong between a raw trace document and a rendered step.
///
/// All variants except [`TraceError::AdapterRenderFailure`] come from the loader
/// and abort the load. Render failures are recorded by the engine and never
/// change replay state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TraceError {
    /// The expected artifact does not exist or is empty.
    #[error("trace artifact not found: {what}")]
    ArtifactNotFound {
        /// What was looked for (a path or a document name).
        what: String,
    },

    /// Top-level shape does not match the expected kind's schema.
    #[error("{kind} trace does not match its schema: {detail}")]
    SchemaMismatch {
        /// Kind the caller expected.
        kind: TraceKind,
        /// Decoder message.
        detail: String,
    },

    /// The document holds no step records.
    #[error("{kind} trace has no steps")]
    EmptyTrace {
        /// Kind the caller expected.
        kind: TraceKind,
    },

    /// A per-step vector breaks the shape shared by the whole trace.
    #[error("step {index}: inconsistent shape: {detail}")]
    InconsistentShape {
        /// First offending step.
        index: usize,
        /// What differs.
        detail: String,
    },

    /// An action tag outside the kind's vocabulary.
    #[error("step {index}: unknown action {action:?}")]
    UnknownAction {
        /// Offending step.
        index: usize,
        /// Tag as written by the producer.
        action: String,
    },

    /// The terminal summary contradicts the steps.
    #[error("summary inconsistent with steps: {detail}")]
    SummaryMismatch {
        /// Step the contradiction was detected at, when one applies.
        index: Option<usize>,
        /// What disagrees.
        detail: String,
    },

    /// A deadlocked process is missing from the resource-allocation graph.
    #[error("deadlocked process {node} does not appear in the resource-allocation graph")]
    DanglingCycleNode {
        /// Process id as displayed.
        node: String,
    },

    /// The presentation adapter failed for one step.
    #[error("render failed at step {index}: {reason}")]
    AdapterRenderFailure {
        /// Cursor position that was being rendered.
        index: usize,
        /// Adapter-provided reason.
        reason: String,
    },
}

impl TraceError {
    /// Offending step index, where one applies.
    #[must_use]
    pub const fn step_index(&self) -> Option<usize> {
        match self {
            Self::InconsistentShape { index, .. }
            | Self::UnknownAction { index, .. }
            | Self::AdapterRenderFailure { index, .. } => Some(*index),
            Self::SummaryMismatch { index, .. } => *index,
            Self::ArtifactNotFound { .. }
            | Self::SchemaMismatch { .. }
            | Self::EmptyTrace { .. }
            | Self::DanglingCycleNode { .. } => None,
        }
    }

    /// Stable machine-readable name of the variant.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::ArtifactNotFound { .. } => "artifact_not_found",
            Self::SchemaMismatch { .. } => "schema_mismatch",
            Self::EmptyTrace { .. } => "empty_trace",
            Self::InconsistentShape { .. } => "inconsistent_shape",
            Self::UnknownAction { .. } => "unknown_action",
            Self::SummaryMismatch { .. } => "summary_mismatch",
            Self::DanglingCycleNode { .. } => "dangling_cycle_node",
            Self::AdapterRenderFailure { .. } => "adapter_render_failure",
        }
    }
}
