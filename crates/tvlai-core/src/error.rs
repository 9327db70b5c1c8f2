//! Error types for tvlai-core.

use crate::Opcode;
use thiserror::Error;

/// Core error type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A listing line could not be parsed.
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    /// An op was asked for an input it does not have.
    #[error("{opcode} has no input {index}")]
    MissingInput { opcode: Opcode, index: usize },

    /// An op that writes a value has no output varnode.
    #[error("{0} has no output varnode")]
    MissingOutput(Opcode),

    /// An operand's size disagrees with what the opcode requires.
    #[error("{opcode}: operand of {found} bytes, expected {expected}")]
    SizeMismatch {
        opcode: Opcode,
        expected: usize,
        found: usize,
    },
}

impl Error {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;
