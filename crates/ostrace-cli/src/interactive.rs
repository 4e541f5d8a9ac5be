// crates/ostrace-cli/src/interactive.rs

//! Line-driven stepping through a trace.
//!
//! Each input line is one command. Due ticks are serviced before every
//! command, so a session started with `play` keeps advancing between lines on
//! a wall clock. `wait MS` lets time pass explicitly, one deadline at a time.
//!
//! | Command | Effect |
//! |---------|--------|
//! | `n`, `next` | next step |
//! | `p`, `prev` | previous step |
//! | `seek N` | jump to step `N` (clamped) |
//! | `play`, `pause`, `reset` | playback control |
//! | `interval MS` | change tick pacing |
//! | `wait MS` | let `MS` milliseconds pass |
//! | `q`, `quit` | end the session |

use anyhow::{anyhow, bail, Context, Result};
use ostrace_core::{PresentationAdapter, ReplayEngine};
use ostrace_scheduler::{Clock, DeadlineQueue, ManualClock, SystemClock};
use std::io::BufRead;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

/// Usage line shown when a session starts.
pub const USAGE: &str = "commands: n | p | seek N | play | pause | reset | interval MS | wait MS | q";

/// One parsed input line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Advance one step.
    Next,
    /// Go back one step.
    Previous,
    /// Jump to a step.
    Seek(i64),
    /// Start or resume playback.
    Play,
    /// Suspend playback.
    Pause,
    /// Back to step 0, stopped.
    Reset,
    /// New tick interval in milliseconds.
    Interval(u64),
    /// Let time pass, in milliseconds.
    Wait(u64),
    /// End the session.
    Quit,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut words = s.split_whitespace();
        let verb = words.next().ok_or_else(|| anyhow!("empty command"))?;
        let cmd = match verb {
            "n" | "next" => Self::Next,
            "p" | "prev" | "previous" => Self::Previous,
            "seek" => {
                let v = argument(&mut words, verb)?;
                Self::Seek(v.parse().with_context(|| format!("bad step index {v:?}"))?)
            }
            "play" => Self::Play,
            "pause" => Self::Pause,
            "reset" => Self::Reset,
            "interval" => {
                let v = argument(&mut words, verb)?;
                Self::Interval(v.parse().with_context(|| format!("bad interval {v:?}"))?)
            }
            "wait" => {
                let v = argument(&mut words, verb)?;
                Self::Wait(v.parse().with_context(|| format!("bad duration {v:?}"))?)
            }
            "q" | "quit" | "exit" => Self::Quit,
            other => bail!("unknown command {other:?}"),
        };
        Ok(cmd)
    }
}

fn argument<'a>(words: &mut impl Iterator<Item = &'a str>, verb: &str) -> Result<&'a str> {
    words
        .next()
        .ok_or_else(|| anyhow!("`{verb}` needs an argument"))
}

/// A tick queue whose clock can be made to pass time.
pub trait Idle {
    /// Let `d` pass on the queue's clock.
    fn idle(&mut self, d: Duration);
}

impl Idle for DeadlineQueue<SystemClock> {
    fn idle(&mut self, d: Duration) {
        std::thread::sleep(d);
    }
}

impl Idle for DeadlineQueue<ManualClock> {
    fn idle(&mut self, d: Duration) {
        self.advance(d);
    }
}

/// What a session did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionReport {
    /// Commands applied, including `quit`.
    pub commands: usize,
    /// Ticks that advanced the cursor.
    pub ticks: usize,
    /// Lines that did not parse, with the reason.
    pub rejected: Vec<String>,
    /// Whether the session ended on `quit` rather than end of input.
    pub quit: bool,
}

/// Read commands from `input` until `quit` or end of input.
pub fn run_commands<A, C, R>(
    engine: &mut ReplayEngine<A, DeadlineQueue<C>>,
    input: R,
) -> Result<SessionReport>
where
    A: PresentationAdapter,
    C: Clock,
    DeadlineQueue<C>: Idle,
    R: BufRead,
{
    let mut report = SessionReport::default();
    for line in input.lines() {
        let line = line.context("read command")?;
        report.ticks += service_due(engine);
        if line.trim().is_empty() {
            continue;
        }
        let cmd = match line.parse::<Command>() {
            Ok(cmd) => cmd,
            Err(e) => {
                warn!(line = line.trim(), error = %e, "command rejected");
                report.rejected.push(format!("{}: {e:#}", line.trim()));
                continue;
            }
        };
        report.commands += 1;
        debug!(?cmd, cursor = engine.cursor(), "command");
        match cmd {
            Command::Next => {
                engine.next();
            }
            Command::Previous => {
                engine.previous();
            }
            Command::Seek(i) => {
                engine.seek(i);
            }
            Command::Play => {
                engine.play();
            }
            Command::Pause => {
                engine.pause();
            }
            Command::Reset => {
                engine.reset();
            }
            Command::Interval(ms) => engine.set_tick_interval(Duration::from_millis(ms)),
            Command::Wait(ms) => report.ticks += wait(engine, Duration::from_millis(ms)),
            Command::Quit => {
                report.quit = true;
                break;
            }
        }
    }
    Ok(report)
}

fn service_due<A, C>(engine: &mut ReplayEngine<A, DeadlineQueue<C>>) -> usize
where
    A: PresentationAdapter,
    C: Clock,
{
    let mut ticks = 0;
    while let Some(id) = engine.scheduler_mut().pop_due() {
        if engine.on_tick(id) {
            ticks += 1;
        }
    }
    ticks
}

fn wait<A, C>(engine: &mut ReplayEngine<A, DeadlineQueue<C>>, total: Duration) -> usize
where
    A: PresentationAdapter,
    C: Clock,
    DeadlineQueue<C>: Idle,
{
    let mut left = total;
    let mut ticks = 0;
    loop {
        match engine.scheduler().time_until_next() {
            Some(t) if t <= left => {
                engine.scheduler_mut().idle(t);
                left -= t;
                ticks += service_due(engine);
            }
            _ => {
                engine.scheduler_mut().idle(left);
                return ticks + service_due(engine);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse() {
        assert_eq!("n".parse::<Command>().unwrap(), Command::Next);
        assert_eq!("  prev ".parse::<Command>().unwrap(), Command::Previous);
        assert_eq!("seek -3".parse::<Command>().unwrap(), Command::Seek(-3));
        assert_eq!("wait 250".parse::<Command>().unwrap(), Command::Wait(250));
        assert_eq!("quit".parse::<Command>().unwrap(), Command::Quit);
        assert!("seek".parse::<Command>().is_err());
        assert!("interval fast".parse::<Command>().is_err());
        assert!("jump 3".parse::<Command>().is_err());
    }
}
