//! Top-level error types.

use thiserror::Error;
use weft_compile::CompileError;
use weft_ir::{EngineFault, GrammarError};

/// The entry rule did not accept the input.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Nothing matched at the start of the input. `furthest` is the
    /// furthest byte offset any matcher examined before giving up.
    #[error("input does not match `{rule}` (furthest position examined: {furthest})")]
    NoMatch { rule: String, furthest: usize },

    /// The entry rule matched a prefix, but the parser requires the whole
    /// input to be consumed.
    #[error("`{rule}` matched up to byte {end}, but the input continues")]
    TrailingInput { rule: String, end: usize },
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Grammar(#[from] GrammarError),

    #[error(transparent)]
    Fault(#[from] EngineFault),

    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A parse value did not have the shape the caller asked for.
    #[error("cannot convert {found} value to {expected}")]
    Conversion {
        expected: &'static str,
        found: &'static str,
    },
}

impl From<CompileError> for Error {
    fn from(err: CompileError) -> Self {
        match err {
            CompileError::Grammar(err) => Error::Grammar(err),
            CompileError::Fault(fault) => Error::Fault(fault),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
