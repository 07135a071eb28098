//! Error types for the resolver core

use thiserror::Error;

use crate::key::{BoardId, ColumnId};

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during resolution.
///
/// Only `Remote` and `Cancelled` escape a top-level resolve; the other kinds
/// are absorbed into fallback scalars inside the resolver.
#[derive(Debug, Error)]
pub enum Error {
    /// Formula source could not be parsed
    #[error("parse error at {position}: {message}")]
    Parse { position: usize, message: String },

    /// Board unknown to the platform
    #[error("no schema for board {0}")]
    MissingSchema(BoardId),

    /// Column id not present on the board
    #[error("column '{column}' not found on board {board}")]
    MissingColumn { board: BoardId, column: ColumnId },

    /// The query client surfaced a transport or platform error
    #[error("remote query failed: {0}")]
    Remote(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Cooperative shutdown
    #[error("resolution cancelled")]
    Cancelled,
}

impl Error {
    /// Wrap an arbitrary client error as a remote failure.
    pub fn remote<E>(cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Remote(Box::new(cause))
    }

    /// A remote shape mismatch (the client answered with the wrong document).
    pub fn remote_msg(message: impl Into<String>) -> Self {
        Error::Remote(message.into().into())
    }

    /// Whether this error must propagate to the caller rather than degrade
    /// into a fallback scalar.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Remote(_) | Error::Cancelled)
    }
}
