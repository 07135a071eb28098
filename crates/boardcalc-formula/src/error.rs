//! Formula error types

use thiserror::Error;

/// Result type for formula parsing
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// A formula parse failure.
///
/// Parsing is tolerant of unknown function names and unterminated literals;
/// this error is reserved for structural problems (unbalanced parentheses,
/// unexpected tokens).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("parse error at {position}: {message}")]
pub struct ParseError {
    /// Character offset into the formula source
    pub position: usize,
    /// Human-readable description
    pub message: String,
}

impl ParseError {
    pub fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

impl From<ParseError> for boardcalc_core::Error {
    fn from(e: ParseError) -> Self {
        boardcalc_core::Error::Parse {
            position: e.position,
            message: e.message,
        }
    }
}
