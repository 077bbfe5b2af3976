#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // Simple command: "echo hello"
    Simple {
        argv: Vec<String>,
    },
    // Sequence: "make; make install"
    Sequence {
        left: Box<Command>,
        right: Box<Command>,
    },
    // Logic AND: "cargo build && cargo run"
    And {
        left: Box<Command>,
        right: Box<Command>,
    },
    // Logic OR: "cargo test || echo failed"
    Or {
        left: Box<Command>,
        right: Box<Command>,
    },
    // Pipeline: "ls | grep target"
    Pipe {
        left: Box<Command>,
        right: Box<Command>,
    },
    // Redirection: "echo logs > file.txt"
    Redirect {
        inner: Box<Command>,
        target: String,
        mode: RedirectMode,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectMode {
    Overwrite, // >
    Append,    // >>
    Input,     // <
}

impl RedirectMode {
    pub fn operator(self) -> &'static str {
        match self {
            RedirectMode::Overwrite => ">",
            RedirectMode::Append => ">>",
            RedirectMode::Input => "<",
        }
    }
}

/// What the parser made of one line of input.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Command(Command),
    /// Nothing but whitespace.
    Empty,
    /// The line was exactly `exit`.
    ExitRequested,
}

impl Command {
    pub fn simple<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Command::Simple {
            argv: argv.into_iter().map(Into::into).collect(),
        }
    }

    /// Short name of the variant, used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Simple { .. } => "simple",
            Command::Sequence { .. } => "sequence",
            Command::And { .. } => "and",
            Command::Or { .. } => "or",
            Command::Pipe { .. } => "pipe",
            Command::Redirect { .. } => "redirect",
        }
    }

    /// Renders the tree as an indented outline, one node per line.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        self.write_outline(0, &mut out);
        out
    }

    fn write_outline(&self, depth: usize, out: &mut String) {
        let pad = "  ".repeat(depth);
        match self {
            Command::Simple { argv } => {
                out.push_str(&format!("{}Simple {:?}\n", pad, argv));
            }
            Command::Sequence { left, right }
            | Command::And { left, right }
            | Command::Or { left, right }
            | Command::Pipe { left, right } => {
                let label = match self {
                    Command::Sequence { .. } => "Sequence (;)",
                    Command::And { .. } => "And (&&)",
                    Command::Or { .. } => "Or (||)",
                    _ => "Pipe (|)",
                };
                out.push_str(&format!("{}{}\n", pad, label));
                left.write_outline(depth + 1, out);
                right.write_outline(depth + 1, out);
            }
            Command::Redirect { inner, target, mode } => {
                out.push_str(&format!("{}Redirect ({} {})\n", pad, mode.operator(), target));
                inner.write_outline(depth + 1, out);
            }
        }
    }
}
