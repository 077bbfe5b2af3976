// Line sources feeding the session loop
use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader, IsTerminal, Lines, Write};
use std::path::Path;

pub trait LineSource {
    /// Next line without its terminator, or `None` at end of input.
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;

    /// Whether a person is typing (decides prompt display and interrupt handling).
    fn is_interactive(&self) -> bool {
        false
    }
}

/// Standard input; the prompt is only shown when stdin is a terminal.
pub struct StdinSource {
    stdin: io::Stdin,
    interactive: bool,
}

impl StdinSource {
    pub fn new() -> Self {
        let stdin = io::stdin();
        let interactive = stdin.is_terminal();
        Self { stdin, interactive }
    }
}

impl LineSource for StdinSource {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        if self.interactive {
            let mut out = io::stdout();
            write!(out, "{}", prompt)?;
            out.flush()?;
        }
        let mut line = String::new();
        let read = self.stdin.read_line(&mut line).context("Failed to read from stdin")?;
        if read == 0 {
            if self.interactive {
                // Leave the terminal on a fresh line after Ctrl-D
                println!();
            }
            return Ok(None);
        }
        Ok(Some(strip_newline(line)))
    }

    fn is_interactive(&self) -> bool {
        self.interactive
    }
}

/// Lines of a script file. Lines starting with `#` (including a shebang) are skipped.
pub struct ScriptSource {
    lines: Lines<BufReader<File>>,
}

impl ScriptSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Failed to open script: {}", path.display()))?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
        })
    }
}

impl LineSource for ScriptSource {
    fn read_line(&mut self, _prompt: &str) -> Result<Option<String>> {
        for line in self.lines.by_ref() {
            let line = line.context("Failed to read script line")?;
            if line.trim_start().starts_with('#') {
                continue;
            }
            return Ok(Some(line));
        }
        Ok(None)
    }
}

/// A fixed list of lines, used for `-c`.
pub struct LineList {
    lines: VecDeque<String>,
}

impl LineList {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

impl LineSource for LineList {
    fn read_line(&mut self, _prompt: &str) -> Result<Option<String>> {
        Ok(self.lines.pop_front())
    }
}

fn strip_newline(mut line: String) -> String {
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    line
}
