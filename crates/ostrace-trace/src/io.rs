// crates/ostrace-trace/src/io.rs

//! I/O helpers for trace, topology and request documents.
//!
//! Supports JSON/CBOR and extension-based auto-detection. Documents are read
//! into a `serde_json::Value` so the loader sees the same shape regardless of
//! the on-disk encoding. A missing or empty file reads as `None`, which the
//! loader reports as `ArtifactNotFound`.

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

use anyhow::{anyhow, Context, Result};
use ostrace_core::{Trace, TraceError, TraceKind};
use serde::Serialize;
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;
use tracing::debug;

use crate::load::{load, LoadOptions, Validation};

/* ---------------- JSON ---------------- */

/// Read a document from **JSON**; `None` if the file is missing or empty.
pub fn read_document_json<P: AsRef<Path>>(path: P) -> Result<Option<Value>> {
    let path_ref = path.as_ref();
    let Some(f) = open_present(path_ref)? else {
        return Ok(None);
    };
    let rdr = BufReader::new(f);
    let v: Value = serde_json::from_reader(rdr)
        .with_context(|| format!("deserialize JSON document {}", path_str(path_ref)))?;
    Ok(Some(v))
}

/// Write a document to **JSON** (pretty).
pub fn write_document_json<P: AsRef<Path>, T: Serialize>(path: P, v: &T) -> Result<()> {
    let path_ref = path.as_ref();
    let f = File::create(path_ref).with_context(|| format!("create {}", path_str(path_ref)))?;
    let mut w = BufWriter::new(f);
    serde_json::to_writer_pretty(&mut w, v).with_context(|| "serialize JSON document")?;
    w.flush().with_context(|| "flush JSON writer")?;
    Ok(())
}

/* ---------------- CBOR ---------------- */

/// Read a document from **CBOR**; `None` if the file is missing or empty.
pub fn read_document_cbor<P: AsRef<Path>>(path: P) -> Result<Option<Value>> {
    let path_ref = path.as_ref();
    let Some(f) = open_present(path_ref)? else {
        return Ok(None);
    };
    let mut rdr = BufReader::new(f);
    let v: Value = ciborium::de::from_reader(&mut rdr)
        .with_context(|| format!("deserialize CBOR document {}", path_str(path_ref)))?;
    Ok(Some(v))
}

/// Write a document to **CBOR**.
pub fn write_document_cbor<P: AsRef<Path>, T: Serialize>(path: P, v: &T) -> Result<()> {
    let path_ref = path.as_ref();
    let f = File::create(path_ref).with_context(|| format!("create {}", path_str(path_ref)))?;
    let mut w = BufWriter::new(f);
    ciborium::ser::into_writer(v, &mut w).with_context(|| "serialize CBOR document")?;
    w.flush().with_context(|| "flush CBOR writer")?;
    Ok(())
}

/* --------------- Auto-detect by extension --------------- */

/// Auto-detect **read** by extension (`.json` / `.cbor`, case-insensitive).
pub fn read_document_auto<P: AsRef<Path>>(path: P) -> Result<Option<Value>> {
    match ext_lower(path.as_ref()).as_deref() {
        Some("json") => read_document_json(path),
        Some("cbor") => read_document_cbor(path),
        Some(other) => Err(anyhow!(
            "unsupported document extension: {} (supported: .json, .cbor)",
            other
        )),
        None => Err(anyhow!("path has no extension (expected .json or .cbor)")),
    }
}

/// Auto-detect **write** (defaults to JSON if unknown/missing).
pub fn write_document_auto<P: AsRef<Path>, T: Serialize>(path: P, v: &T) -> Result<()> {
    match ext_lower(path.as_ref()).as_deref() {
        Some("cbor") => write_document_cbor(path, v),
        _ => write_document_json(path, v),
    }
}

/* --------------- Trace entry point --------------- */

/// Read and validate a trace artifact.
///
/// Validation failures surface as a [`TraceError`] inside the returned
/// `anyhow::Error`, so callers can `downcast_ref::<TraceError>()` to branch on
/// the taxonomy. A `topology` path that does not exist is `ArtifactNotFound`.
pub fn load_trace_file(
    path: &Path,
    kind: TraceKind,
    validation: Validation,
    topology: Option<&Path>,
) -> Result<Trace> {
    let doc = read_document_auto(path)?;
    let topo_doc = match topology {
        Some(p) => Some(read_document_auto(p)?.ok_or_else(|| TraceError::ArtifactNotFound {
            what: format!("topology document {}", path_str(p)),
        })?),
        None => None,
    };

    let mut opts = LoadOptions::new(validation);
    if let Some(t) = topo_doc.as_ref() {
        opts = opts.with_topology(t);
    }
    let trace = match doc {
        Some(v) => load(Some(&v), kind, &opts)?,
        None => {
            return Err(TraceError::ArtifactNotFound {
                what: format!("{kind} trace {}", path_str(path)),
            }
            .into())
        }
    };
    debug!(path = %path_str(path), %kind, steps = trace.len(), "trace file loaded");
    Ok(trace)
}

/* ---------------- Small helpers ---------------- */

fn open_present(path: &Path) -> Result<Option<File>> {
    let meta = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("stat {}", path_str(path))),
    };
    if meta.len() == 0 {
        return Ok(None);
    }
    let f = File::open(path).with_context(|| format!("open {}", path_str(path)))?;
    Ok(Some(f))
}

#[inline]
fn ext_lower(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

#[inline]
fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
