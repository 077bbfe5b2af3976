use anyhow::{Context, Result, bail};
use colored::*;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use crate::engine::Environment;

pub const CONFIG_FILE: &str = "treesh.toml";

#[derive(Debug, Default, Deserialize)]
pub struct TreeshConfig {
    #[serde(default)]
    pub shell: ShellConfig,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Where each layered variable came from, oldest first. Filled by `load_config`.
    #[serde(skip)]
    pub env_provenance: BTreeMap<String, Vec<(String, String)>>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogStrategy {
    Always,
    ErrorOnly,
    #[default]
    None,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    pub prompt: String,
    pub log_strategy: LogStrategy,
    pub log_dir: PathBuf,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: "$ ".to_string(),
            log_strategy: LogStrategy::None,
            log_dir: PathBuf::from(".treesh").join("logs"),
        }
    }
}

impl TreeshConfig {
    /// The process environment with the configured layers applied on top.
    pub fn environment(&self) -> Environment {
        let mut environment = Environment::from_process();
        for (key, val) in &self.env {
            environment.set(key.clone(), val.clone());
        }
        environment
    }

    fn record(&mut self, source: &str, key: String, val: String) {
        self.env_provenance
            .entry(key.clone())
            .or_default()
            .push((source.to_string(), val.clone()));
        self.env.insert(key, val);
    }
}

/// Loads `treesh.toml` and the matching `.env` file.
///
/// With `explicit` set the file must exist; otherwise `<dir>/treesh.toml` is optional and a
/// missing file yields the defaults.
pub fn load_config(dir: &Path, explicit: Option<&Path>) -> Result<TreeshConfig> {
    let config_path = match explicit {
        Some(path) => {
            if !path.exists() {
                bail!("Configuration file not found: {:?}", path);
            }
            path.to_path_buf()
        }
        None => dir.join(CONFIG_FILE),
    };

    // 1. treesh.toml (Base Layer)
    let mut config = if config_path.exists() {
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        parse_config(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?
    } else {
        TreeshConfig::default()
    };

    let source = config_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| CONFIG_FILE.to_string());
    for (key, val) in &config.env {
        config
            .env_provenance
            .entry(key.clone())
            .or_default()
            .push((source.clone(), val.clone()));
    }

    // 2. .env next to the config file (Override Layer)
    // Determines filename: .env or .env.prod based on TREESH_ENV
    let env_filename = env::var("TREESH_ENV")
        .map(|v| format!(".env.{}", v))
        .unwrap_or_else(|_| ".env".to_string());

    let env_dir = config_path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(dir);
    let env_path = env_dir.join(&env_filename);

    if env_path.exists() {
        log::info!("{} Loading environment from: {}", "🌿".green(), env_filename.bold());

        // Read as an iterator so the shell's own process environment stays untouched.
        for item in dotenvy::from_path_iter(&env_path)? {
            let (key, val) = item?;
            config.record(&env_filename, key, val);
        }
    }

    Ok(config)
}

pub fn parse_config(content: &str) -> Result<TreeshConfig> {
    let config: TreeshConfig = toml::from_str(content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path(), None).unwrap();
        assert_eq!(config.shell.prompt, "$ ");
        assert_eq!(config.shell.log_strategy, LogStrategy::None);
        assert!(config.env.is_empty());
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(load_config(dir.path(), Some(&missing)).is_err());
    }

    #[test]
    fn test_parse_shell_section() {
        let config = parse_config(
            r#"
            [shell]
            prompt = "tree> "
            log_strategy = "error-only"

            [env]
            GREETING = "hi"
            "#,
        )
        .unwrap();
        assert_eq!(config.shell.prompt, "tree> ");
        assert_eq!(config.shell.log_strategy, LogStrategy::ErrorOnly);
        assert_eq!(config.shell.log_dir, PathBuf::from(".treesh/logs"));
        assert_eq!(config.env.get("GREETING").map(String::as_str), Some("hi"));
    }

    #[test]
    fn test_dotenv_overrides_toml() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "[env]\nMODE = \"toml\"\nKEEP = \"yes\"\n").unwrap();
        fs::write(dir.path().join(".env"), "MODE=dotenv\n").unwrap();

        let config = load_config(dir.path(), None).unwrap();
        assert_eq!(config.env["MODE"], "dotenv");
        assert_eq!(config.env["KEEP"], "yes");

        let history = &config.env_provenance["MODE"];
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], (CONFIG_FILE.to_string(), "toml".to_string()));
        assert_eq!(history[1], (".env".to_string(), "dotenv".to_string()));

        let environment = config.environment();
        assert_eq!(environment.get("MODE"), Some("dotenv"));
        assert!(environment.get("PATH").is_some());
    }

    #[test]
    fn test_unknown_log_strategy_is_rejected() {
        assert!(parse_config("[shell]\nlog_strategy = \"sometimes\"\n").is_err());
    }
}
