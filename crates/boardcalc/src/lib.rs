//! # boardcalc
//!
//! Resolves the exact scalar a user would see in a board cell for a named
//! column on a named item, including formula columns whose arguments are
//! mirrors of formulas on other boards, across unbounded nesting and
//! cycles.
//!
//! This facade crate re-exports the public API of the boardcalc workspace:
//!
//! - [`ResolverSession`] / [`SessionOptions`]: the per-call resolver core
//! - [`QueryClient`]: the remote capability the caller supplies
//! - [`Scalar`]: the tagged value every resolution produces
//! - The formula front-end ([`parse_formula`], [`evaluate`],
//!   [`extract_column_ids`]) for callers that validate formulas upstream
//!
//! ## Example
//!
//! ```rust,ignore
//! use boardcalc::prelude::*;
//!
//! let session = ResolverSession::new(client, SessionOptions::default());
//! let value = session.resolve(123, "formula1", 100).await?;
//! println!("{value}");
//! session.close();
//! ```

pub mod prelude;

pub use boardcalc_core::{
    ColumnDef, ColumnKind, ColumnSettings, DateValue, Error, LinkedColumnTarget, MirrorFunction,
    ResolutionKey, Result, Scalar,
};
pub use boardcalc_formula::{
    evaluate, extract_column_ids, parse_formula, Environment, ParseError,
};
pub use boardcalc_resolver::{
    CancelToken, ColumnRecord, ColumnValue, DeepMirrorRecord, DisplayValueRecord, LinkedItem,
    MirroredItem, QueryClient, QueryRequest, QueryResponse, RawColumnDef, ResolverSession,
    SessionOptions,
};
