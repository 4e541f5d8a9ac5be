//! The single capability the replay engine depends on.
//!
//! The engine hands a [`StepView`] to [`PresentationAdapter::render`] on every
//! cursor change. Adapters switch on the step's kind internally; the engine
//! knows nothing about matrices, graphs, or frames on screen.

use serde::Serialize;
use thiserror::Error;

use crate::replay::PlayState;
use crate::stats::Progress;
use crate::types::{Edge, Step, Summary, TraceKind};

/// Why an adapter could not render a step.
#[derive(Error, Debug)]
#[error("{reason}")]
pub struct RenderError {
    reason: String,
}

impl RenderError {
    /// Error with a free-form reason.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// The reason text.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl From<std::io::Error> for RenderError {
    fn from(e: std::io::Error) -> Self {
        Self::new(format!("i/o: {e}"))
    }
}

impl From<serde_json::Error> for RenderError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(format!("json: {e}"))
    }
}

/// Everything an adapter needs to draw one step.
///
/// Built after the engine has committed the cursor change, so `index`,
/// `play_state` and `progress` describe the engine's new state.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct StepView<'a> {
    /// Trace kind.
    pub kind: TraceKind,
    /// The step at the cursor.
    pub step: &'a Step,
    /// Cursor position.
    pub index: usize,
    /// Final step index of the trace.
    pub last_index: usize,
    /// Terminal summary; present only when `index == last_index`.
    pub summary: Option<&'a Summary>,
    /// Play state after the transition.
    pub play_state: PlayState,
    /// Running counts up to `index`.
    pub progress: Progress,
    /// RAG edges attached to a DEADLOCK trace; empty otherwise.
    #[serde(skip)]
    pub topology: &'a [Edge],
}

impl StepView<'_> {
    /// Whether this is the final step.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.index == self.last_index
    }
}

/// Render capability implemented by the host UI.
///
/// Must be synchronous. A returned error is reported by the engine but never
/// rolls back the cursor change.
pub trait PresentationAdapter {
    /// Draw `view`.
    fn render(&mut self, view: &StepView<'_>) -> Result<(), RenderError>;
}

impl<A: PresentationAdapter + ?Sized> PresentationAdapter for &mut A {
    fn render(&mut self, view: &StepView<'_>) -> Result<(), RenderError> {
        (**self).render(view)
    }
}

impl<A: PresentationAdapter + ?Sized> PresentationAdapter for Box<A> {
    fn render(&mut self, view: &StepView<'_>) -> Result<(), RenderError> {
        (**self).render(view)
    }
}

/// Adapter backed by a closure.
pub struct FnAdapter<F>(pub F);

impl<F> PresentationAdapter for FnAdapter<F>
where
    F: FnMut(&StepView<'_>) -> Result<(), RenderError>,
{
    fn render(&mut self, view: &StepView<'_>) -> Result<(), RenderError> {
        (self.0)(view)
    }
}

/// Adapter that draws nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullAdapter;

impl PresentationAdapter for NullAdapter {
    fn render(&mut self, _view: &StepView<'_>) -> Result<(), RenderError> {
        Ok(())
    }
}
