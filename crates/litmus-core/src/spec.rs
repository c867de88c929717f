//! Spec-builder state machine.
//!
//! Consumes the document-order stream of directives and code blocks and
//! accumulates per-name test specs. The machine is a pure transition function
//! over an explicit state value; the traversal driver threads the state and
//! owns the accumulated book.
//!
//! `program` is sticky: once declared it applies to every subsequently named
//! test until redefined. `exit` and `only` are one-shot: they attach to the
//! single test whose code block completes next, then clear.

use std::collections::HashMap;

use crate::comments::extract_comments;
use crate::directive::{parse_comment, Directive, DirectiveKind};
use crate::document::{scan_document, DocEvent};
use crate::error::{Fatal, Position};

/// A code-block-derived value with its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub text: String,
    pub lang: Option<String>,
    pub position: Position,
}

/// A directive-derived value with its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sourced<T> {
    pub value: T,
    pub position: Position,
}

/// What an `exit` directive demands of the subprocess's exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitExpectation {
    Code(i32),
    AnyNonzero,
}

/// The four directive kinds that await a code block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockField {
    Input,
    Output,
    Error,
    Check,
}

impl BlockField {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::Error => "error",
            Self::Check => "check",
        }
    }

    fn of(kind: DirectiveKind) -> Option<Self> {
        match kind {
            DirectiveKind::In => Some(Self::Input),
            DirectiveKind::Out => Some(Self::Output),
            DirectiveKind::Err => Some(Self::Error),
            DirectiveKind::Check => Some(Self::Check),
            _ => None,
        }
    }
}

/// Everything ever declared for one test name, append-only until validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTest {
    /// The sticky program value in effect when a block last completed.
    pub program: Option<Sourced<String>>,
    pub input: Vec<Block>,
    pub output: Vec<Block>,
    pub error: Vec<Block>,
    pub check: Vec<Block>,
    pub exit: Vec<Sourced<ExitExpectation>>,
    pub only: Vec<Position>,
}

/// Accumulated specs in declaration (first-reference) order.
#[derive(Debug, Default)]
pub struct SpecBook {
    order: Vec<String>,
    by_name: HashMap<String, RawTest>,
}

impl SpecBook {
    fn entry(&mut self, name: &str) -> &mut RawTest {
        if !self.by_name.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.by_name.entry(name.to_string()).or_default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Consume the book in declaration order.
    #[must_use]
    pub fn into_tests(self) -> Vec<(String, RawTest)> {
        let mut by_name = self.by_name;
        self.order
            .into_iter()
            .filter_map(|name| by_name.remove(&name).map(|raw| (name, raw)))
            .collect()
    }
}

/// Sticky values that survive a return to the idle state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Carry {
    pub program: Option<Sourced<String>>,
}

/// Values that attach to the single next test, then clear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OneShot {
    pub exit: Option<Sourced<ExitExpectation>>,
    pub only: Option<Position>,
}

/// Parser state between document events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseState {
    /// Ready for any directive; plain code blocks are documentation.
    Idle { carry: Carry, oneshot: OneShot },
    /// A block-expecting directive was seen; the next event must be code.
    AwaitingBlock {
        field: BlockField,
        name: String,
        carry: Carry,
        oneshot: OneShot,
    },
}

impl Default for ParseState {
    fn default() -> Self {
        ParseState::Idle {
            carry: Carry::default(),
            oneshot: OneShot::default(),
        }
    }
}

/// One input to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseEvent {
    Directive(Directive),
    CodeBlock(Block),
}

/// Advance the machine by one event, recording completed values in `book`.
pub fn step(state: ParseState, event: ParseEvent, book: &mut SpecBook) -> Result<ParseState, Fatal> {
    match (state, event) {
        (ParseState::Idle { carry, oneshot }, ParseEvent::Directive(directive)) => {
            apply_directive(carry, oneshot, directive)
        }
        // Documentation example, not a test fixture.
        (state @ ParseState::Idle { .. }, ParseEvent::CodeBlock(_)) => Ok(state),
        (
            ParseState::AwaitingBlock {
                field,
                name,
                carry,
                oneshot,
            },
            ParseEvent::CodeBlock(block),
        ) => {
            let test = book.entry(&name);
            match field {
                BlockField::Input => test.input.push(block),
                BlockField::Output => test.output.push(block),
                BlockField::Error => test.error.push(block),
                BlockField::Check => test.check.push(block),
            }
            test.program = carry.program.clone();
            if let Some(exit) = oneshot.exit {
                test.exit.push(exit);
            }
            if let Some(only) = oneshot.only {
                test.only.push(only);
            }
            Ok(ParseState::Idle {
                carry,
                oneshot: OneShot::default(),
            })
        }
        (ParseState::AwaitingBlock { field, .. }, ParseEvent::Directive(directive)) => {
            Err(Fatal::UnexpectedCommand {
                expected: field.name(),
                command: format!("{} {}", directive.kind.word(), directive.text),
                position: directive.position,
            })
        }
    }
}

fn apply_directive(
    carry: Carry,
    oneshot: OneShot,
    directive: Directive,
) -> Result<ParseState, Fatal> {
    if let Some(field) = BlockField::of(directive.kind) {
        return Ok(ParseState::AwaitingBlock {
            field,
            name: directive.text,
            carry,
            oneshot,
        });
    }
    match directive.kind {
        DirectiveKind::Program => Ok(ParseState::Idle {
            carry: Carry {
                program: Some(Sourced {
                    value: directive.text,
                    position: directive.position,
                }),
            },
            oneshot,
        }),
        DirectiveKind::Exit => {
            let Some(expectation) = parse_exit_argument(&directive.text) else {
                return Err(Fatal::BadExitCode {
                    argument: directive.text,
                    position: directive.position,
                });
            };
            Ok(ParseState::Idle {
                carry,
                oneshot: OneShot {
                    exit: Some(Sourced {
                        value: expectation,
                        position: directive.position,
                    }),
                    only: oneshot.only,
                },
            })
        }
        DirectiveKind::Only => Ok(ParseState::Idle {
            carry,
            oneshot: OneShot {
                exit: oneshot.exit,
                only: Some(directive.position),
            },
        }),
        // Block-expecting kinds were handled above.
        _ => Ok(ParseState::Idle { carry, oneshot }),
    }
}

fn parse_exit_argument(text: &str) -> Option<ExitExpectation> {
    let text = text.trim();
    if text == "nonzero" {
        return Some(ExitExpectation::AnyNonzero);
    }
    text.parse::<i32>()
        .ok()
        .filter(|code| *code >= 0)
        .map(ExitExpectation::Code)
}

/// Parse a whole document into accumulated test specs.
///
/// This is the traversal driver: markup nodes are scanned for directive
/// comments, code nodes become block events, and the machine state is
/// threaded through in document order.
pub fn collect_specs(document: &str) -> Result<SpecBook, Fatal> {
    let mut book = SpecBook::default();
    let mut state = ParseState::default();

    for event in scan_document(document) {
        match event {
            DocEvent::Markup { text, position } => {
                for body in extract_comments(&text, position)? {
                    if let Some(directive) = parse_comment(&body, position)? {
                        state = step(state, ParseEvent::Directive(directive), &mut book)?;
                    }
                }
            }
            DocEvent::Code {
                text,
                lang,
                position,
            } => {
                state = step(
                    state,
                    ParseEvent::CodeBlock(Block {
                        text,
                        lang,
                        position,
                    }),
                    &mut book,
                )?;
            }
        }
    }

    Ok(book)
}
