//! ostrace-core: trace model, error taxonomy, and the replay engine.
//!
//! This crate defines the **stable boundary** used across OSTRACE crates:
//! - the immutable trace model (`Trace`, `Step`, `Summary`, …) for the three
//!   recorded algorithms (Banker's safety check, RAG deadlock detection,
//!   page replacement),
//! - the `TraceError` taxonomy shared by the loader and the engine,
//! - the presentation capability (`PresentationAdapter`) hosts implement, and
//! - the `ReplayEngine`: a cursor + play state machine over one trace.
//!
//! ```no_run
//! use ostrace_core::{FnAdapter, RenderError, ReplayConfig, ReplayEngine, StepView, Trace};
//! use ostrace_scheduler::DeadlineQueue;
//! # fn demo(trace: Trace) {
//! let adapter = FnAdapter(|view: &StepView<'_>| -> Result<(), RenderError> {
//!     println!("step {} of {}", view.index + 1, view.last_index + 1);
//!     Ok(())
//! });
//! let mut engine = ReplayEngine::new(trace, adapter, DeadlineQueue::default(), ReplayConfig::default());
//! engine.next();
//! engine.play();
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::doc_markdown
)]

/// Presentation capability and the per-step view handed to it.
pub mod adapter;
/// Error taxonomy shared by loader and engine.
pub mod error;
/// Replay engine: cursor, play state, tick handling.
pub mod replay;
/// Running statistics up to a cursor position.
pub mod stats;
/// Immutable trace model.
pub mod types;

pub use adapter::*;
pub use error::*;
pub use replay::*;
pub use stats::*;
pub use types::*;

/// Commonly-used items for quick imports.
///
/// ```rust
/// use ostrace_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        adapter::{PresentationAdapter, RenderError, StepView},
        error::TraceError,
        replay::{PlayState, ReplayConfig, ReplayEngine},
        types::*,
    };
}
