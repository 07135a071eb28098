//! Convenient star-import for the common types.
//!
//! ```rust
//! use boardcalc::prelude::*;
//! ```

pub use boardcalc_core::{Error, Result, Scalar};
pub use boardcalc_resolver::{
    CancelToken, QueryClient, QueryRequest, QueryResponse, ResolverSession, SessionOptions,
};
