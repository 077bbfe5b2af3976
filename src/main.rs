mod cli;
mod config;
mod engine;
mod handlers;
mod logger;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use config::load_config;
use handlers::{env, run};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let current_dir = std::env::current_dir()?;
    let config = load_config(&current_dir, cli.config.as_deref())?;

    if cli.env {
        return env::handle_env(&config, cli.trace);
    }

    let status = run::handle_run(&cli, &config)?;
    std::process::exit(status);
}
