//! Recognition of `!test <command> <rest>` annotations in comment bodies.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Fatal, Position};

/// The fixed command vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    Program,
    In,
    Out,
    Err,
    Check,
    Exit,
    Only,
}

impl DirectiveKind {
    pub const ALL: [DirectiveKind; 7] = [
        DirectiveKind::Program,
        DirectiveKind::In,
        DirectiveKind::Out,
        DirectiveKind::Err,
        DirectiveKind::Check,
        DirectiveKind::Exit,
        DirectiveKind::Only,
    ];

    #[must_use]
    pub fn word(self) -> &'static str {
        match self {
            Self::Program => "program",
            Self::In => "in",
            Self::Out => "out",
            Self::Err => "err",
            Self::Check => "check",
            Self::Exit => "exit",
            Self::Only => "only",
        }
    }

    #[must_use]
    pub fn from_word(word: &str) -> Option<Self> {
        match word {
            "program" => Some(Self::Program),
            "in" => Some(Self::In),
            "out" => Some(Self::Out),
            "err" => Some(Self::Err),
            "check" => Some(Self::Check),
            "exit" => Some(Self::Exit),
            "only" => Some(Self::Only),
            _ => None,
        }
    }

    /// Every supported command word, for "unknown command" diagnostics.
    #[must_use]
    pub fn supported_words() -> Vec<&'static str> {
        Self::ALL.iter().map(|kind| kind.word()).collect()
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.word())
    }
}

/// One recognized annotation, positioned at its containing markup block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub kind: DirectiveKind,
    pub text: String,
    pub position: Position,
}

fn directive_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| match Regex::new(r"(?s)^!test\s+(.*)$") {
        Ok(re) => re,
        Err(err) => panic!("directive pattern: {err}"),
    })
}

/// Collapse the `#-` escape token to a literal `-`.
///
/// Consecutive dashes are illegal inside HTML comments, so program strings
/// (often shell snippets) write `#-` for each dash they need.
#[must_use]
pub fn unescape(text: &str) -> String {
    text.replace("#-", "-")
}

/// Recognize a directive in one comment body.
///
/// Bodies that don't open with `!test` are ordinary comments and yield
/// `Ok(None)`. A `!test` body whose command word is not in the vocabulary is
/// fatal.
pub fn parse_comment(body: &str, position: Position) -> Result<Option<Directive>, Fatal> {
    let trimmed = body.trim();
    let Some(captures) = directive_pattern().captures(trimmed) else {
        return Ok(None);
    };
    let command = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
    let Some(word) = command.split_whitespace().next() else {
        return Ok(None);
    };
    let Some(kind) = DirectiveKind::from_word(word) else {
        return Err(Fatal::UnknownCommand {
            word: word.to_string(),
            position,
        });
    };
    let text = unescape(command[word.len()..].trim());
    Ok(Some(Directive {
        kind,
        text,
        position,
    }))
}
