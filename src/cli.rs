use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "treesh", version, about = "treesh: a small shell that runs each line as a tree of processes")]
pub struct Cli {
    /// Read command lines from this file instead of standard input
    pub script: Option<PathBuf>,

    /// Run a single command line and exit with its status
    #[arg(short = 'c', long = "command", conflicts_with = "script")]
    pub command: Option<String>,

    /// Configuration file (defaults to ./treesh.toml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the parsed command tree instead of executing it
    #[arg(short = 'd', long = "dry-run")]
    pub dry_run: bool,

    /// Inspect the environment handed to spawned programs
    #[arg(short = 'e', long = "env")]
    pub env: bool,

    /// Show where each variable came from (with --env)
    #[arg(long, requires = "env")]
    pub trace: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}
