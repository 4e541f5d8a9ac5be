// crates/ostrace-cli/src/config.rs

//! `ostrace.toml` settings.
//!
//! ```toml
//! [replay]
//! tick_interval_ms = 800
//! validation = "lenient"
//!
//! [producer]
//! executable = "./build/os_core"
//! workdir = "data"
//! ```
//!
//! Every key is optional. Values from the command line win over the file.

use anyhow::{Context, Result};
use ostrace_core::{ReplayConfig, DEFAULT_TICK_INTERVAL_MS};
use ostrace_trace::load::Validation;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "ostrace.toml";

/// Top-level configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Replay engine settings.
    pub replay: ReplaySection,
    /// External producer settings.
    pub producer: ProducerSection,
}

/// `[replay]`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReplaySection {
    /// Delay between playback ticks.
    pub tick_interval_ms: u64,
    /// Summary checking mode.
    pub validation: Validation,
}

impl Default for ReplaySection {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            validation: Validation::Strict,
        }
    }
}

/// `[producer]`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProducerSection {
    /// Algorithm executable, invoked as `<executable> <input> <output>`.
    pub executable: Option<PathBuf>,
    /// Directory for request and trace documents.
    pub workdir: PathBuf,
}

impl Default for ProducerSection {
    fn default() -> Self {
        Self {
            executable: None,
            workdir: PathBuf::from("."),
        }
    }
}

/// Command-line values that take precedence over the file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    /// `--interval-ms`
    pub tick_interval_ms: Option<u64>,
    /// `--validation`
    pub validation: Option<Validation>,
    /// `--producer`
    pub executable: Option<PathBuf>,
    /// `--workdir`
    pub workdir: Option<PathBuf>,
}

impl Config {
    /// Parse a TOML document.
    pub fn from_toml_str(src: &str) -> Result<Self> {
        toml::from_str(src).context("parse config toml")
    }

    /// Load `path`, or `ostrace.toml` from the working directory if present,
    /// or defaults.
    ///
    /// An explicitly named file that cannot be read is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        if !explicit && !path.exists() {
            debug!("no {DEFAULT_CONFIG_FILE}; using defaults");
            return Ok(Self::default());
        }
        let src = std::fs::read_to_string(&path)
            .with_context(|| format!("read config {}", path.display()))?;
        let cfg = Self::from_toml_str(&src)
            .with_context(|| format!("in config {}", path.display()))?;
        debug!(path = %path.display(), ?cfg, "config loaded");
        Ok(cfg)
    }

    /// Apply command-line overrides.
    #[must_use]
    pub fn with_overrides(mut self, o: Overrides) -> Self {
        if let Some(ms) = o.tick_interval_ms {
            self.replay.tick_interval_ms = ms;
        }
        if let Some(v) = o.validation {
            self.replay.validation = v;
        }
        if o.executable.is_some() {
            self.producer.executable = o.executable;
        }
        if let Some(w) = o.workdir {
            self.producer.workdir = w;
        }
        self
    }

    /// Engine knobs derived from `[replay]`.
    #[must_use]
    pub fn replay_config(&self) -> ReplayConfig {
        ReplayConfig::with_interval_ms(self.replay.tick_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = Config::from_toml_str("").unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.replay.tick_interval_ms, 1000);
        assert_eq!(cfg.replay.validation, Validation::Strict);
    }

    #[test]
    fn partial_sections_fill_in() {
        let cfg = Config::from_toml_str(
            "[replay]\ntick_interval_ms = 800\n\n[producer]\nexecutable = \"bin/core\"\n",
        )
        .unwrap();
        assert_eq!(cfg.replay.tick_interval_ms, 800);
        assert_eq!(cfg.replay.validation, Validation::Strict);
        assert_eq!(cfg.producer.executable, Some(PathBuf::from("bin/core")));
        assert_eq!(cfg.producer.workdir, PathBuf::from("."));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Config::from_toml_str("[replay]\nspeed = 2\n").is_err());
        assert!(Config::from_toml_str("[replay]\nvalidation = \"loose\"\n").is_err());
    }

    #[test]
    fn overrides_win() {
        let cfg = Config::from_toml_str("[replay]\ntick_interval_ms = 800\nvalidation = \"lenient\"\n")
            .unwrap()
            .with_overrides(Overrides {
                tick_interval_ms: Some(0),
                validation: Some(Validation::Strict),
                ..Overrides::default()
            });
        assert_eq!(cfg.replay.validation, Validation::Strict);
        // Zero is clamped by the engine config, not rejected.
        assert_eq!(cfg.replay_config().tick_interval, Duration::from_millis(1));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("ostrace.toml");
        std::fs::write(&p, "[producer]\nworkdir = \"data\"\n").unwrap();
        let cfg = Config::load(Some(&p)).unwrap();
        assert_eq!(cfg.producer.workdir, PathBuf::from("data"));
    }
}
