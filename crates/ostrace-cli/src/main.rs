// crates/ostrace-cli/src/main.rs

#![forbid(unsafe_code)]
#![deny(
    rust_2018_idioms,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo
)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ostrace_cli::adapters::{describe_summary, TextAdapter};
use ostrace_cli::config::{Config, Overrides};
use ostrace_cli::interactive::{run_commands, USAGE};
use ostrace_cli::playback::{export_jsonl, run_realtime, PlaybackReport};
use ostrace_cli::producer::Producer;
use ostrace_core::{ReplayConfig, ReplayEngine, Trace, TraceError, TraceKind};
use ostrace_scheduler::{DeadlineQueue, SystemClock};
use ostrace_trace::io::{load_trace_file, write_document_auto};
use ostrace_trace::load::Validation;
use ostrace_trace::request::RunRequest;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "ostrace",
    about = "Replay recorded OS algorithm traces",
    long_about = "Replay recorded OS algorithm traces.\n\nLoads Banker's, deadlock-detection and page-replacement traces produced by an external \
                  algorithm process, validates them, and steps through them on a timer.",
    version = env!("CARGO_PKG_VERSION"),
    disable_help_subcommand = true
)]
struct Cli {
    /// Config file (default: ./ostrace.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Summary checking: strict fails the load, lenient warns
    #[arg(long, value_enum, global = true)]
    validation: Option<ValidationOpt>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Validate a trace and print its shape and summary
    Inspect {
        /// Trace kind
        #[arg(value_enum, long)]
        kind: KindOpt,

        /// Trace document (JSON/CBOR)
        trace: PathBuf,

        /// RAG topology or DEADLOCK run request (DEADLOCK only)
        #[arg(long)]
        topology: Option<PathBuf>,
    },

    /// Replay a trace in the terminal at the configured pace
    Play {
        /// Trace kind
        #[arg(value_enum, long)]
        kind: KindOpt,

        /// Trace document (JSON/CBOR)
        trace: PathBuf,

        /// RAG topology or DEADLOCK run request (DEADLOCK only)
        #[arg(long)]
        topology: Option<PathBuf>,

        /// Delay between steps in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Start at this step (clamped)
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        from: i64,
    },

    /// Step through a trace with commands read from stdin (n, p, seek N, play, pause, reset, q)
    Step {
        /// Trace kind
        #[arg(value_enum, long)]
        kind: KindOpt,

        /// Trace document (JSON/CBOR)
        trace: PathBuf,

        /// RAG topology or DEADLOCK run request (DEADLOCK only)
        #[arg(long)]
        topology: Option<PathBuf>,

        /// Delay between steps in milliseconds while playing
        #[arg(long)]
        interval_ms: Option<u64>,
    },

    /// Replay on a virtual clock and write one JSON view per step (NDJSON)
    Export {
        /// Trace kind
        #[arg(value_enum, long)]
        kind: KindOpt,

        /// Trace document (JSON/CBOR)
        trace: PathBuf,

        /// RAG topology or DEADLOCK run request (DEADLOCK only)
        #[arg(long)]
        topology: Option<PathBuf>,

        /// Output path; stdout if omitted
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Write the demo run request for a mode
    Request {
        /// Algorithm
        #[arg(value_enum, long)]
        kind: KindOpt,

        /// Output path (JSON/CBOR)
        #[arg(long, default_value = "input.json")]
        out: PathBuf,
    },

    /// Run the producer on a request, then load and replay its trace
    Run {
        /// Algorithm (uses the demo request unless --request is given)
        #[arg(value_enum, long)]
        kind: KindOpt,

        /// Request document to send instead of the demo
        #[arg(long)]
        request: Option<PathBuf>,

        /// Producer executable (overrides config)
        #[arg(long)]
        producer: Option<PathBuf>,

        /// Directory for request and trace documents (overrides config)
        #[arg(long)]
        workdir: Option<PathBuf>,

        /// Delay between steps in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Only validate and summarize; do not replay
        #[arg(long, default_value_t = false)]
        no_play: bool,
    },
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, ValueEnum)]
enum KindOpt {
    /// Banker's safety check
    Banker,
    /// Resource-allocation graph deadlock detection
    Deadlock,
    /// Page replacement
    Memory,
}

impl From<KindOpt> for TraceKind {
    fn from(k: KindOpt) -> Self {
        match k {
            KindOpt::Banker => Self::Banker,
            KindOpt::Deadlock => Self::Deadlock,
            KindOpt::Memory => Self::Memory,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, ValueEnum)]
enum ValidationOpt {
    Strict,
    Lenient,
}

impl From<ValidationOpt> for Validation {
    fn from(v: ValidationOpt) -> Self {
        match v {
            ValidationOpt::Strict => Self::Strict,
            ValidationOpt::Lenient => Self::Lenient,
        }
    }
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let base = Config::load(cli.config.as_deref())?;
    let validation = cli.validation.map(Validation::from);

    match cli.cmd {
        Cmd::Inspect {
            kind,
            trace,
            topology,
        } => {
            let cfg = base.with_overrides(Overrides {
                validation,
                ..Overrides::default()
            });
            inspect(kind.into(), &trace, topology.as_deref(), &cfg)
        }

        Cmd::Play {
            kind,
            trace,
            topology,
            interval_ms,
            from,
        } => {
            let cfg = base.with_overrides(Overrides {
                tick_interval_ms: interval_ms,
                validation,
                ..Overrides::default()
            });
            let t = load(kind.into(), &trace, topology.as_deref(), &cfg)?;
            play(t, from, cfg.replay_config())
        }

        Cmd::Step {
            kind,
            trace,
            topology,
            interval_ms,
        } => {
            let cfg = base.with_overrides(Overrides {
                tick_interval_ms: interval_ms,
                validation,
                ..Overrides::default()
            });
            let t = load(kind.into(), &trace, topology.as_deref(), &cfg)?;
            step(t, cfg.replay_config())
        }

        Cmd::Export {
            kind,
            trace,
            topology,
            output,
        } => {
            let cfg = base.with_overrides(Overrides {
                validation,
                ..Overrides::default()
            });
            export(kind.into(), &trace, topology.as_deref(), output.as_deref(), &cfg)
        }

        Cmd::Request { kind, out } => write_request(kind.into(), &out),

        Cmd::Run {
            kind,
            request,
            producer,
            workdir,
            interval_ms,
            no_play,
        } => {
            let cfg = base.with_overrides(Overrides {
                tick_interval_ms: interval_ms,
                validation,
                executable: producer,
                workdir,
            });
            run(kind.into(), request.as_deref(), no_play, &cfg)
        }
    }
}

/// Initialize tracing with an env-driven filter (default INFO).
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_writer(io::stderr)
        .compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

/// Ensure the parent directory for a file exists.
fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating parent directory {}", dir.display()))?;
        }
    }
    Ok(())
}

fn load(kind: TraceKind, trace: &Path, topology: Option<&Path>, cfg: &Config) -> Result<Trace> {
    info!(%kind, trace = %trace.display(), validation = ?cfg.replay.validation, "loading trace");
    let t = load_trace_file(trace, kind, cfg.replay.validation, topology)
        .map_err(explain)
        .with_context(|| format!("loading {} trace {}", kind, trace.display()))?;
    for w in t.warnings() {
        eprintln!("warning: {w}");
    }
    Ok(t)
}

/// Prefix typed validation failures with their stable code.
fn explain(e: anyhow::Error) -> anyhow::Error {
    match e.downcast_ref::<TraceError>() {
        Some(te) => {
            let code = te.code();
            e.context(format!("trace rejected ({code})"))
        }
        None => e,
    }
}

fn inspect(kind: TraceKind, trace: &Path, topology: Option<&Path>, cfg: &Config) -> Result<()> {
    let t = load(kind, trace, topology, cfg)?;
    print_overview(&t);
    Ok(())
}

fn print_overview(t: &Trace) {
    println!("{} trace: {} step(s)", t.kind(), t.len());
    if !t.topology().is_empty() {
        println!("RAG edges: {}", t.topology().len());
    }
    println!("{}", describe_summary(t.summary()));
    if !t.warnings().is_empty() {
        println!("{} warning(s) (lenient)", t.warnings().len());
    }
}

fn play(trace: Trace, from: i64, cfg: ReplayConfig) -> Result<()> {
    let stdout = io::stdout();
    let mut engine = ReplayEngine::new(
        trace,
        TextAdapter::new(stdout.lock()),
        DeadlineQueue::new(SystemClock::new()),
        cfg,
    );
    engine.seek(from);
    let report = run_realtime(&mut engine);
    report_failures(&report)
}

fn step(trace: Trace, cfg: ReplayConfig) -> Result<()> {
    eprintln!("{USAGE}");
    let stdout = io::stdout();
    let mut engine = ReplayEngine::new(
        trace,
        TextAdapter::new(stdout.lock()),
        DeadlineQueue::new(SystemClock::new()),
        cfg,
    );
    let session = run_commands(&mut engine, io::stdin().lock())?;
    info!(
        commands = session.commands,
        rejected = session.rejected.len(),
        ticks = session.ticks,
        cursor = engine.cursor(),
        "session ended"
    );
    let render_failures = engine.take_render_failures();
    report_failures(&PlaybackReport {
        renders: engine.render_count(),
        render_failures,
        ..PlaybackReport::default()
    })
}

fn report_failures(report: &PlaybackReport) -> Result<()> {
    if let Some(first) = report.render_failures.first() {
        bail!(
            "{} step(s) failed to render; first: {first}",
            report.render_failures.len()
        );
    }
    Ok(())
}

fn export(
    kind: TraceKind,
    trace: &Path,
    topology: Option<&Path>,
    output: Option<&Path>,
    cfg: &Config,
) -> Result<()> {
    let t = load(kind, trace, topology, cfg)?;
    let report = match output {
        Some(path) => {
            ensure_parent_dir(path)?;
            let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
            let (_, report) = export_jsonl(t, BufWriter::new(f), cfg.replay_config())?;
            eprintln!("Exported {} step view(s) → {}", report.renders, path.display());
            report
        }
        None => {
            let stdout = io::stdout();
            let (_, report) = export_jsonl(t, stdout.lock(), cfg.replay_config())?;
            report
        }
    };
    report_failures(&report)
}

fn write_request(kind: TraceKind, out: &Path) -> Result<()> {
    ensure_parent_dir(out)?;
    write_document_auto(out, &RunRequest::demo(kind))
        .with_context(|| format!("writing request to {}", out.display()))?;
    println!("Wrote {kind} demo request → {}", out.display());
    Ok(())
}

fn run(kind: TraceKind, request: Option<&Path>, no_play: bool, cfg: &Config) -> Result<()> {
    let Some(exe) = cfg.producer.executable.as_deref() else {
        bail!("no producer configured (set [producer].executable or pass --producer)");
    };
    let req = match request {
        Some(path) => {
            let doc = ostrace_trace::io::read_document_auto(path)?
                .with_context(|| format!("request {} is missing or empty", path.display()))?;
            let req: RunRequest = serde_json::from_value(doc)
                .with_context(|| format!("parse request {}", path.display()))?;
            if req.mode != kind {
                bail!("request mode is {} but --kind is {kind}", req.mode);
            }
            req
        }
        None => RunRequest::demo(kind),
    };

    let producer = Producer::new(exe, &cfg.producer.workdir);
    let trace = producer
        .run_and_load(&req, cfg.replay.validation)
        .map_err(explain)
        .with_context(|| format!("{kind} run via {}", producer.executable().display()))?;
    for w in trace.warnings() {
        eprintln!("warning: {w}");
    }

    if no_play {
        print_overview(&trace);
        return Ok(());
    }
    play(trace, 0, cfg.replay_config())
}
