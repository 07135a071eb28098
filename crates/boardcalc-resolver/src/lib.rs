//! # boardcalc-resolver
//!
//! The recursive resolver core: computes the exact scalar a user would see
//! for a named column on a named item, even when that column is a formula
//! whose arguments are mirrors of formulas on other boards, across
//! unbounded nesting and cycles.
//!
//! A [`ResolverSession`] is created per top-level call and owns all caches,
//! the request coordinator and the [`QueryClient`] handle for its duration.
//! No state is process-global.
//!
//! ## Example
//!
//! ```rust,ignore
//! use boardcalc_resolver::{ResolverSession, SessionOptions};
//!
//! let session = ResolverSession::new(client, SessionOptions::default());
//! let value = session.resolve(123, "formula1", 100).await?;
//! println!("{value}");
//! session.close().await;
//! ```

pub mod cancel;
pub mod client;
pub mod coordinator;
pub mod extract;
pub mod query;
mod resolve;
pub mod schema;
pub mod session;
pub mod strategy;

pub use cancel::CancelToken;
pub use client::{
    ColumnRecord, ColumnValue, DeepMirrorRecord, DisplayValueRecord, LinkedItem, MirroredItem,
    QueryClient, QueryRequest, QueryResponse, RawColumnDef,
};
pub use session::{ResolverSession, SessionOptions};

use std::sync::Arc;

use boardcalc_core::Error;

/// A cloneable wrapper around [`Error`] for fan-out to multiple awaiters of
/// one in-flight resolution.
#[derive(Debug, Clone)]
pub(crate) struct SharedError(Arc<Error>);

impl SharedError {
    pub(crate) fn new(e: Error) -> Self {
        Self(Arc::new(e))
    }

    /// Re-materialise an owned error for one awaiter. Cancellation keeps its
    /// identity; everything else fatal is a remote failure by construction.
    pub(crate) fn to_error(&self) -> Error {
        match &*self.0 {
            Error::Cancelled => Error::Cancelled,
            other => Error::remote_msg(other.to_string()),
        }
    }
}
