use crate::engine::ast::{Command, ParseOutcome, RedirectMode};
use anyhow::{Result, bail};
use log::{debug, warn};

#[derive(Debug, Clone, Copy)]
enum Split {
    Sequence,
    And,
    Or,
    Pipe,
    Redirect(RedirectMode),
}

// Checked in this order; the first operator present in the text becomes the root.
// ">>" must come before ">" so an append is never read as a truncate.
const OPERATORS: [(&str, Split); 7] = [
    (";", Split::Sequence),
    ("&&", Split::And),
    ("||", Split::Or),
    ("|", Split::Pipe),
    (">>", Split::Redirect(RedirectMode::Append)),
    (">", Split::Redirect(RedirectMode::Overwrite)),
    ("<", Split::Redirect(RedirectMode::Input)),
];

/// Parses one input line.
///
/// Blank lines and the `exit` built-in are reported through [`ParseOutcome`] rather than
/// as commands; everything else becomes a command tree.
pub fn parse(line: &str) -> Result<ParseOutcome> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(ParseOutcome::Empty);
    }
    if trimmed == "exit" {
        return Ok(ParseOutcome::ExitRequested);
    }

    let cmd = parse_command(trimmed)?;
    debug!("parsed {} command from {:?}", cmd.kind(), trimmed);
    Ok(ParseOutcome::Command(cmd))
}

/// Builds the tree for a non-empty piece of text by splitting at the leftmost occurrence
/// of the highest-priority operator present.
pub fn parse_command(text: &str) -> Result<Command> {
    let text = text.trim();
    if text.is_empty() {
        bail!("syntax error: empty command");
    }

    for (op, split) in OPERATORS {
        if let Some((left, right)) = text.split_once(op) {
            return build(split, op, left, right);
        }
    }

    let argv = tokenize(text);
    if argv.is_empty() {
        bail!("syntax error: empty command");
    }
    Ok(Command::simple(argv))
}

fn build(split: Split, op: &str, left: &str, right: &str) -> Result<Command> {
    match split {
        Split::Redirect(mode) => {
            let target = right.trim();
            if target.is_empty() {
                bail!("syntax error: missing file name after '{}'", op);
            }
            Ok(Command::Redirect {
                inner: Box::new(operand(left, op)?),
                target: target.to_string(),
                mode,
            })
        }
        // "echo hi;" is just "echo hi"
        Split::Sequence if right.trim().is_empty() => operand(left, op),
        Split::Sequence => Ok(Command::Sequence {
            left: Box::new(operand(left, op)?),
            right: Box::new(operand(right, op)?),
        }),
        Split::And => Ok(Command::And {
            left: Box::new(operand(left, op)?),
            right: Box::new(operand(right, op)?),
        }),
        Split::Or => Ok(Command::Or {
            left: Box::new(operand(left, op)?),
            right: Box::new(operand(right, op)?),
        }),
        Split::Pipe => Ok(Command::Pipe {
            left: Box::new(operand(left, op)?),
            right: Box::new(operand(right, op)?),
        }),
    }
}

fn operand(text: &str, op: &str) -> Result<Command> {
    if text.trim().is_empty() {
        bail!("syntax error near unexpected token '{}'", op);
    }
    parse_command(text)
}

/// Splits text into words on whitespace, honoring one level of single or double quotes.
///
/// Quote characters are stripped; whitespace and the other quote character inside a quoted
/// region are kept literally. An unterminated quote runs to the end of the input.
pub fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current_token = String::new();
    let mut quote: Option<char> = None;

    // Distinguishes an explicitly empty word ("") from no word at all.
    let mut token_started = false;

    for c in input.chars() {
        match quote {
            Some(open) if c == open => quote = None,
            Some(_) => current_token.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                token_started = true;
            }
            None if c.is_whitespace() => {
                if token_started {
                    tokens.push(std::mem::take(&mut current_token));
                    token_started = false;
                }
            }
            None => {
                current_token.push(c);
                token_started = true;
            }
        }
    }

    if let Some(open) = quote {
        warn!("unterminated {} quote, reading to end of line", open);
    }
    if token_started {
        tokens.push(current_token);
    }

    tokens
}
