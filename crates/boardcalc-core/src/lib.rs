//! # boardcalc-core
//!
//! Core data model shared by the boardcalc crates:
//! - [`Scalar`]: the tagged value every boundary conversion passes through
//! - [`ColumnKind`] / [`ColumnDef`] / [`ColumnSettings`]: board schema types
//! - [`ResolutionKey`]: the (board, column, item) identity used for caching,
//!   in-flight deduplication and cycle detection
//! - [`Error`]: the error sum type of the resolver core

pub mod column;
pub mod error;
pub mod key;
pub mod scalar;

pub use column::{ColumnDef, ColumnKind, ColumnSettings, LinkedColumnTarget, MirrorFunction};
pub use error::{Error, Result};
pub use key::{BoardId, ColumnId, ItemId, ResolutionKey};
pub use scalar::{DateValue, Scalar};
