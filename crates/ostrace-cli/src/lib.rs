// crates/ostrace-cli/src/lib.rs

//! Host-side pieces behind the `ostrace` binary.
//!
//! - `config`: `ostrace.toml` settings and CLI overrides.
//! - `adapters`: text and JSON-lines presentation adapters.
//! - `playback`: wall-clock and virtual-clock drivers for the replay engine.
//! - `interactive`: line commands for stepping through a trace by hand.
//! - `producer`: spawning the external algorithm process.

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

/// Presentation adapters for terminals and pipelines.
pub mod adapters;
/// TOML configuration.
pub mod config;
/// Line-driven stepping sessions.
pub mod interactive;
/// Drivers that feed ticks to the replay engine.
pub mod playback;
/// External producer invocation.
pub mod producer;
