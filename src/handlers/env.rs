use anyhow::Result;
use colored::*;
use std::env;
use crate::config::TreeshConfig;

/// Source name for variables inherited from the shell's own environment.
const PROCESS_SOURCE: &str = "process";

pub fn handle_env(config: &TreeshConfig, trace: bool) -> Result<()> {
    let environment = config.environment();

    if trace {
        println!("{} Environment Variable Trace:", "🔍".cyan());

        for key in config.env_provenance.keys() {
            let history = layer_history(config, key);

            println!("{}:", key.bold());
            for (idx, (source, val)) in history.iter().enumerate() {
                let last = idx == history.len() - 1;
                let prefix = if last { "└──".green() } else { "├──".blue() };
                println!(
                    "  {} {} = {} ({})",
                    prefix,
                    source,
                    val,
                    if last { "active".green() } else { "overridden".red().dimmed() }
                );
            }
        }
    } else {
        println!(
            "{} Environment for spawned programs ({} variables):",
            "🔍".cyan(),
            environment.len()
        );

        if environment.is_empty() {
            println!("  (none)");
        }

        for (key, val) in environment.iter() {
            let source = active_layer(config, key);
            if source == PROCESS_SOURCE {
                println!("  {} = {}", key.bold(), val);
            } else {
                println!("  {} = {} {}", key.bold(), val, format!("[{}]", source).yellow());
            }
        }
    }

    Ok(())
}

/// Name of the layer whose value a spawned program sees for `key`.
fn active_layer<'a>(config: &'a TreeshConfig, key: &str) -> &'a str {
    config
        .env_provenance
        .get(key)
        .and_then(|history| history.last())
        .map(|(source, _)| source.as_str())
        .unwrap_or(PROCESS_SOURCE)
}

/// Every value `key` took, oldest first, starting with the inherited one if any.
fn layer_history<'a>(config: &'a TreeshConfig, key: &str) -> Vec<(&'a str, String)> {
    let mut history: Vec<(&str, String)> = Vec::new();
    if let Ok(original) = env::var(key) {
        history.push((PROCESS_SOURCE, original));
    }
    if let Some(layers) = config.env_provenance.get(key) {
        history.extend(layers.iter().map(|(source, val)| (source.as_str(), val.clone())));
    }
    history
}
