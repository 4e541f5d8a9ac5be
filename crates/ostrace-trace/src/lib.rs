//! Trace ingestion for OSTRACE: wire format, validation, and artifact I/O.
//!
//! This crate provides the building blocks between an external algorithm
//! process and the replay engine:
//!
//! - `format`: serde mirrors of the producer's JSON documents.
//! - `load`: the loader/validator turning a parsed document into a `Trace`.
//! - `io`: JSON/CBOR read/write helpers with extension auto-detection.
//! - `request`: the producer-side request document that triggers a run.
//! - `generator`: deterministic synthetic traces for tests/benches.
//!
//! We intentionally avoid broad re-exports so callers use stable paths like
//! `ostrace_trace::load::load`.

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

/// Serde mirrors of the producer's trace documents.
pub mod format;
/// Deterministic synthetic trace generator (for tests/benches).
pub mod generator;
/// JSON/CBOR I/O helpers for trace and request documents.
pub mod io;
/// Loader/validator: raw document → immutable `Trace`.
pub mod load;
/// Producer-side run request documents.
pub mod request;
