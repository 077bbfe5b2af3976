use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::config::{LogStrategy, ShellConfig};

/// Appends executed lines to a per-day transcript file.
#[derive(Debug, Clone)]
pub struct Transcript {
    strategy: LogStrategy,
    dir: PathBuf,
}

impl Transcript {
    pub fn new(config: &ShellConfig) -> Self {
        Self {
            strategy: config.log_strategy,
            dir: config.log_dir.clone(),
        }
    }

    pub fn wants(&self, status: i32) -> bool {
        match self.strategy {
            LogStrategy::None => false,
            LogStrategy::ErrorOnly => status != 0,
            LogStrategy::Always => true,
        }
    }

    /// Records one line. Returns the file written to, or `None` when the strategy skips it.
    pub fn record(&self, line: &str, status: i32, duration: Duration) -> Result<Option<PathBuf>> {
        if !self.wants(status) {
            return Ok(None);
        }
        let now = Local::now();
        let path = self.dir.join(format!("{}.log", now.format("%Y-%m-%d")));
        append_entry(&path, &format_entry(now, line, status, duration))?;
        Ok(Some(path))
    }
}

fn format_entry(at: DateTime<Local>, line: &str, status: i32, duration: Duration) -> String {
    format!(
        "{} status={} duration={}ms {}\n",
        at.to_rfc3339(),
        status,
        duration.as_millis(),
        line.trim()
    )
}

fn append_entry(path: &Path, entry: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).context("Failed to create log directory")?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open transcript {}", path.display()))?;
    file.write_all(entry.as_bytes())
        .context("Failed to write transcript entry")?;
    Ok(())
}
