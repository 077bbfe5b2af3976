use anyhow::{Context, Result};
use colored::*;
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use crate::config::TreeshConfig;
use crate::engine::{Environment, ExecutionContext, ParseOutcome, parse};
use crate::handlers::input::LineSource;
use crate::logger::Transcript;

/// Status recorded for a line that failed to parse.
pub const STATUS_SYNTAX_ERROR: i32 = 2;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Keeps Ctrl-C from killing the shell itself. Spawned programs get the default
/// disposition back when they exec, so the interrupt still stops them.
pub fn install_interrupt_handler() -> Result<()> {
    ctrlc::set_handler(|| INTERRUPTED.store(true, Ordering::SeqCst))
        .context("Failed to install Ctrl-C handler")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    Ran(i32),
    Skipped,
    Exit,
}

pub struct Session {
    env: Environment,
    prompt: String,
    transcript: Transcript,
    dry_run: bool,
    last_status: i32,
}

impl Session {
    pub fn new(config: &TreeshConfig, dry_run: bool) -> Self {
        Self::with_environment(config.environment(), config, dry_run)
    }

    pub fn with_environment(env: Environment, config: &TreeshConfig, dry_run: bool) -> Self {
        Self {
            env,
            prompt: config.shell.prompt.clone(),
            transcript: Transcript::new(&config.shell),
            dry_run,
            last_status: 0,
        }
    }

    pub fn last_status(&self) -> i32 {
        self.last_status
    }

    fn prompt(&self) -> String {
        if self.last_status == 0 {
            self.prompt.green().to_string()
        } else {
            self.prompt.red().to_string()
        }
    }

    /// Parses and runs one line, updating the last status.
    pub fn run_line(&mut self, line: &str) -> LineOutcome {
        let started = Instant::now();

        let status = match parse(line) {
            Ok(ParseOutcome::Empty) => return LineOutcome::Skipped,
            Ok(ParseOutcome::ExitRequested) => return LineOutcome::Exit,
            Ok(ParseOutcome::Command(cmd)) if self.dry_run => {
                println!("{} [DRY-RUN] {}", "::".yellow(), line.trim());
                print!("{}", cmd.outline());
                0
            }
            Ok(ParseOutcome::Command(cmd)) => cmd.execute(&self.env, ExecutionContext::NeedsNewProcess),
            Err(e) => {
                eprintln!("{} {}", "treesh:".red().bold(), e);
                STATUS_SYNTAX_ERROR
            }
        };

        if INTERRUPTED.swap(false, Ordering::SeqCst) {
            debug!("interrupted while running {:?}", line.trim());
            eprintln!();
        }

        self.last_status = status;
        if let Err(e) = self.transcript.record(line, status, started.elapsed()) {
            warn!("{} {:#}", "⚠️".yellow(), e);
        }
        LineOutcome::Ran(status)
    }

    /// Reads and runs lines until end of input or `exit`. Returns the last status.
    pub fn run<S: LineSource>(&mut self, source: &mut S) -> Result<i32> {
        loop {
            let prompt = if source.is_interactive() {
                self.prompt()
            } else {
                String::new()
            };
            let Some(line) = source.read_line(&prompt)? else {
                break;
            };
            if self.run_line(&line) == LineOutcome::Exit {
                debug!("exit requested");
                break;
            }
        }
        Ok(self.last_status())
    }
}
