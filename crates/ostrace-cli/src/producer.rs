// crates/ostrace-cli/src/producer.rs

//! Running the external algorithm process.
//!
//! The producer is a black box invoked as `<executable> <input> <output>`.
//! It reads a [`RunRequest`] from `<input>` and writes the trace document for
//! `request.mode` to `<output>`. A non-zero exit aborts before any load.

use anyhow::{bail, Context, Result};
use ostrace_core::{Trace, TraceError};
use ostrace_trace::io::{load_trace_file, read_document_json, write_document_json};
use ostrace_trace::load::Validation;
use ostrace_trace::request::RunRequest;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Name of the request document inside the work directory.
pub const INPUT_FILE: &str = "input.json";

/// An executable plus the directory its documents live in.
#[derive(Clone, Debug)]
pub struct Producer {
    executable: PathBuf,
    workdir: PathBuf,
}

/// Paths written by one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunArtifacts {
    /// Request document handed to the producer.
    pub input: PathBuf,
    /// Trace document the producer wrote.
    pub output: PathBuf,
}

impl Producer {
    /// Producer at `executable`, exchanging files under `workdir`.
    pub fn new(executable: impl Into<PathBuf>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            workdir: workdir.into(),
        }
    }

    /// Executable path.
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Conventional output file for `request.mode`.
    #[must_use]
    pub fn output_path(&self, request: &RunRequest) -> PathBuf {
        let name = format!("{}_steps.json", request.mode.as_str().to_ascii_lowercase());
        self.workdir.join(name)
    }

    /// Write `request`, run the producer, and return the artifact paths.
    pub fn run(&self, request: &RunRequest) -> Result<RunArtifacts> {
        request.validate().context("invalid run request")?;
        std::fs::create_dir_all(&self.workdir)
            .with_context(|| format!("create work directory {}", self.workdir.display()))?;

        let input = self.workdir.join(INPUT_FILE);
        let output = self.output_path(request);
        write_document_json(&input, request)?;
        // A stale trace from an earlier run must not pass for this one.
        match std::fs::remove_file(&output) {
            Ok(()) => debug!(path = %output.display(), "removed previous output"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("remove {}", output.display()));
            }
        }

        info!(exe = %self.executable.display(), mode = %request.mode, "running producer");
        let result = Command::new(&self.executable)
            .arg(&input)
            .arg(&output)
            .output();
        let out = match result {
            Ok(o) => o,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(TraceError::ArtifactNotFound {
                    what: format!("producer executable {}", self.executable.display()),
                }
                .into());
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("spawn {}", self.executable.display()));
            }
        };

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            let code = out
                .status
                .code()
                .map_or_else(|| "a signal".to_owned(), |c| format!("code {c}"));
            bail!("producer exited with {code}: {}", stderr.trim());
        }

        // The producer reports unsupported modes in-band.
        if let Some(doc) = read_document_json(&output)? {
            if let Some(msg) = doc.get("error").and_then(|v| v.as_str()) {
                bail!("producer reported an error: {msg}");
            }
        }
        debug!(output = %output.display(), "producer finished");
        Ok(RunArtifacts { input, output })
    }

    /// Run and load the resulting trace. DEADLOCK runs are checked against the
    /// request's own edge list.
    pub fn run_and_load(&self, request: &RunRequest, validation: Validation) -> Result<Trace> {
        let artifacts = self.run(request)?;
        let topology = request.topology().map(|_| artifacts.input.as_path());
        load_trace_file(&artifacts.output, request.mode, validation, topology)
    }
}
