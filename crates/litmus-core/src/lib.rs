//! Parse-time core of litmus.
//!
//! Turns a markdown document into named, validated test specifications:
//! markup nodes are scanned for `!test` directive comments, code blocks
//! become fixture values, and a state machine with sticky/one-shot fields
//! accumulates everything into per-name specs. A fatal error anywhere in this
//! pipeline aborts the whole run; validation failures isolate to one test.

pub mod comments;
pub mod directive;
pub mod document;
pub mod error;
pub mod spec;
pub mod validate;

pub use directive::DirectiveKind;
pub use error::{Fatal, Note, Notes, Position};
pub use spec::{collect_specs, Block, ExitExpectation, RawTest, Sourced, SpecBook};
pub use validate::{validate, Invalid, NormalizedTest};
