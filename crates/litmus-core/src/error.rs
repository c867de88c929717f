//! Source positions, result-note values, and the fatal parse error type.
//!
//! Fatal errors abort the whole run before any subprocess is dispatched; they
//! are distinct from per-test validation failures, which isolate to one test.

use std::fmt;

/// Location of a node in the scanned document, in 1-based lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub start_line: usize,
    pub end_line: usize,
}

impl Position {
    #[must_use]
    pub fn line(line: usize) -> Self {
        Self {
            start_line: line,
            end_line: line,
        }
    }

    #[must_use]
    pub fn span(start_line: usize, end_line: usize) -> Self {
        Self {
            start_line,
            end_line,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start_line == self.end_line {
            write!(f, "line {}", self.start_line)
        } else {
            write!(f, "lines {}-{}", self.start_line, self.end_line)
        }
    }
}

/// One value in a test result's diagnostics block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Note {
    Text(String),
    Number(i64),
    List(Vec<String>),
}

impl From<&str> for Note {
    fn from(value: &str) -> Self {
        Note::Text(value.to_string())
    }
}

impl From<String> for Note {
    fn from(value: String) -> Self {
        Note::Text(value)
    }
}

impl From<i64> for Note {
    fn from(value: i64) -> Self {
        Note::Number(value)
    }
}

/// Ordered key/value diagnostics attached to a failing result line.
pub type Notes = Vec<(String, Note)>;

/// Parse-time errors that abort the run before any test executes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Fatal {
    #[error("unterminated HTML comment")]
    UnterminatedComment { line: usize },
    #[error("unterminated HTML CDATA section")]
    UnterminatedCdata { line: usize },
    #[error("unknown command type")]
    UnknownCommand { word: String, position: Position },
    #[error("unexpected command (expected {expected} text)")]
    UnexpectedCommand {
        expected: &'static str,
        command: String,
        position: Position,
    },
    #[error("bad exit code specified")]
    BadExitCode { argument: String, position: Position },
}

impl Fatal {
    /// The quoted token named on the synthetic failure line.
    #[must_use]
    pub fn subject(&self) -> String {
        match self {
            Fatal::UnterminatedComment { .. } => "'<!--'".to_string(),
            Fatal::UnterminatedCdata { .. } => "'<![CDATA['".to_string(),
            Fatal::UnknownCommand { word, .. } => format!("'{word}'"),
            Fatal::UnexpectedCommand { command, .. } => format!("'{command}'"),
            Fatal::BadExitCode { argument, .. } => format!("'exit {argument}'"),
        }
    }

    /// Location plus remediation notes for the synthetic failure entry.
    #[must_use]
    pub fn notes(&self, supported_commands: &[&str]) -> Notes {
        match self {
            Fatal::UnterminatedComment { line } => vec![
                ("location".to_string(), Note::Text(Position::line(*line).to_string())),
                (
                    "how to fix".to_string(),
                    Note::Text(
                        "Terminate the comment with '-->' where appropriate.\n\
                         Check that '-->' doesn't occur anywhere unexpected."
                            .to_string(),
                    ),
                ),
            ],
            Fatal::UnterminatedCdata { line } => vec![
                ("location".to_string(), Note::Text(Position::line(*line).to_string())),
                (
                    "how to fix".to_string(),
                    Note::Text(
                        "Terminate the CDATA section with ']]>' where appropriate.\n\
                         Check that ']]>' doesn't occur anywhere unexpected."
                            .to_string(),
                    ),
                ),
            ],
            Fatal::UnknownCommand { position, .. } => vec![
                ("location".to_string(), Note::Text(position.to_string())),
                (
                    "supported commands".to_string(),
                    Note::List(supported_commands.iter().map(|c| (*c).to_string()).collect()),
                ),
            ],
            Fatal::UnexpectedCommand { position, .. } => vec![
                ("location".to_string(), Note::Text(position.to_string())),
                (
                    "how to fix".to_string(),
                    Note::Text(
                        "Check that your 'in' / 'out' / 'err' / 'check' commands are each followed\n\
                         by a block of code, not another test command."
                            .to_string(),
                    ),
                ),
            ],
            Fatal::BadExitCode { position, .. } => vec![
                ("location".to_string(), Note::Text(position.to_string())),
                (
                    "how to fix".to_string(),
                    Note::Text(
                        "Use an integer >=0, or the word 'nonzero',\n\
                         to accept any non-zero exit code"
                            .to_string(),
                    ),
                ),
            ],
        }
    }
}
