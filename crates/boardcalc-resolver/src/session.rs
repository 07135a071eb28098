//! Resolver session
//!
//! A [`ResolverSession`] is created per top-level call, owns the schema
//! cache, value cache, in-flight map and request coordinator, and holds the
//! [`QueryClient`] handle for its duration. Sessions are not shared across
//! concurrent top-level calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::{BoxFuture, Shared};

use boardcalc_core::{BoardId, Error, ItemId, ResolutionKey, Result, Scalar};

use crate::cancel::CancelToken;
use crate::client::QueryClient;
use crate::coordinator::Coordinator;
use crate::query::Queries;
use crate::resolve::{Resolution, ResolveCtx};
use crate::schema::SchemaCache;
use crate::SharedError;

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Coordinator batch window in milliseconds. Zero disables batching
    /// delay without affecting correctness.
    pub batch_window_ms: u64,
    /// Schema cache TTL in milliseconds.
    pub schema_ttl_ms: u64,
    /// Scalar returned on cycle re-entry in numeric aggregation contexts.
    pub cycle_break_numeric_default: f64,
    /// Verbose per-resolution diagnostics.
    pub debug_log: bool,
    /// Optional external cancellation signal.
    pub cancel: Option<CancelToken>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            batch_window_ms: 5,
            schema_ttl_ms: 300_000,
            cycle_break_numeric_default: 0.0,
            debug_log: false,
            cancel: None,
        }
    }
}

/// One in-flight resolution, awaitable by any number of subscribers.
pub(crate) type SharedResolve =
    Shared<BoxFuture<'static, std::result::Result<Scalar, SharedError>>>;

/// Value cache and in-flight map, guarded together so the
/// check-cache-then-register step is atomic.
#[derive(Default)]
pub(crate) struct ResolverState {
    pub(crate) values: HashMap<ResolutionKey, Scalar>,
    pub(crate) inflight: HashMap<ResolutionKey, SharedResolve>,
}

pub(crate) struct SessionInner {
    pub(crate) queries: Queries,
    pub(crate) schemas: SchemaCache,
    pub(crate) coordinator: Coordinator,
    pub(crate) cancel: CancelToken,
    pub(crate) options: SessionOptions,
    pub(crate) state: Mutex<ResolverState>,
    pub(crate) closed: AtomicBool,
}

/// The public handle of the resolver core.
pub struct ResolverSession {
    inner: Arc<SessionInner>,
}

impl ResolverSession {
    /// Create a session around a query client.
    pub fn new(client: impl QueryClient + 'static, options: SessionOptions) -> Self {
        Self::with_arc_client(Arc::new(client), options)
    }

    /// Create a session around an already-shared query client.
    pub fn with_arc_client(client: Arc<dyn QueryClient>, options: SessionOptions) -> Self {
        let cancel = options.cancel.clone().unwrap_or_default();
        let queries = Queries::new(client, cancel.clone());
        let schemas = SchemaCache::new(
            queries.clone(),
            Duration::from_millis(options.schema_ttl_ms),
        );
        let coordinator = Coordinator::new(
            queries.clone(),
            cancel.clone(),
            Duration::from_millis(options.batch_window_ms),
        );

        Self {
            inner: Arc::new(SessionInner {
                queries,
                schemas,
                coordinator,
                cancel,
                options,
                state: Mutex::new(ResolverState::default()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Resolve one column of one item to the scalar a user would see.
    pub async fn resolve(&self, board: BoardId, column: &str, item: ItemId) -> Result<Scalar> {
        self.check_open()?;
        let key = ResolutionKey::new(board, column, item);
        let resolution = Arc::clone(&self.inner)
            .resolve_key(key, ResolveCtx::root())
            .await?;
        Ok(match resolution {
            Resolution::Value(value) => value,
            // Unreachable from an empty root stack, but total anyway
            Resolution::CycleReentry => Scalar::Empty,
        })
    }

    /// Resolve one column across many items, batching remote fetches.
    pub async fn resolve_batch(
        &self,
        board: BoardId,
        column: &str,
        items: &[ItemId],
    ) -> Result<HashMap<ItemId, Scalar>> {
        self.check_open()?;
        Arc::clone(&self.inner)
            .resolve_batch_inner(board, column.to_string(), items.to_vec(), ResolveCtx::root())
            .await
    }

    /// Force all pending coordinator batches to fire now.
    pub fn flush(&self) {
        self.inner.coordinator.flush();
    }

    /// Cancel the session's work cooperatively.
    pub fn cancel(&self) {
        self.inner.cancel.cancel();
    }

    /// Flush the coordinator and release the caches. Further calls fail
    /// with [`Error::Cancelled`].
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.coordinator.flush();
        let mut state = self.inner.state.lock().unwrap();
        state.values.clear();
        state.inflight.clear();
    }

    fn check_open(&self) -> Result<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}
