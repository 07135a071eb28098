//! Schema cache
//!
//! Per-session cache of board schemas. The first touch of a board fetches
//! all of its columns in one query; a pending-cell map guarantees that two
//! concurrent resolves of the same board share one fetch (the second awaits
//! the first). Entries carry an `Instant` stamp honouring the configured
//! TTL, though sessions rarely live that long.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::OnceCell;

use boardcalc_core::{BoardId, ColumnDef, ColumnId, Error, Result};

use crate::client::RawColumnDef;
use crate::query::Queries;

/// A board's decoded schema.
#[derive(Debug, Default)]
pub struct BoardSchema {
    columns: HashMap<ColumnId, ColumnDef>,
}

impl BoardSchema {
    pub fn from_raw(raw: Vec<RawColumnDef>) -> Self {
        let columns = raw
            .into_iter()
            .map(|c| {
                let def = ColumnDef::decode(c.id, c.title, &c.kind, c.settings);
                (def.id.clone(), def)
            })
            .collect();
        Self { columns }
    }

    pub fn column(&self, id: &str) -> Option<&ColumnDef> {
        self.columns.get(id)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// `None` inside the cell means the platform does not know the board.
type SchemaCell = Arc<OnceCell<Option<Arc<BoardSchema>>>>;

struct Entry {
    cell: SchemaCell,
    fetched_at: Instant,
}

/// Per-session schema cache with in-flight fetch deduplication.
pub struct SchemaCache {
    queries: Queries,
    ttl: Duration,
    boards: Mutex<HashMap<BoardId, Entry>>,
}

impl SchemaCache {
    pub fn new(queries: Queries, ttl: Duration) -> Self {
        Self {
            queries,
            ttl,
            boards: Mutex::new(HashMap::new()),
        }
    }

    fn cell_for(&self, board: BoardId) -> SchemaCell {
        let mut boards = self.boards.lock().unwrap();
        match boards.get(&board) {
            Some(entry)
                if entry.cell.get().is_none() || entry.fetched_at.elapsed() < self.ttl =>
            {
                Arc::clone(&entry.cell)
            }
            _ => {
                let cell: SchemaCell = Arc::new(OnceCell::new());
                boards.insert(
                    board,
                    Entry {
                        cell: Arc::clone(&cell),
                        fetched_at: Instant::now(),
                    },
                );
                cell
            }
        }
    }

    /// Load a board's schema, fetching it at most once per session (modulo
    /// TTL expiry). Unknown boards yield [`Error::MissingSchema`].
    pub async fn board(&self, board: BoardId) -> Result<Arc<BoardSchema>> {
        let cell = self.cell_for(board);
        let loaded = cell
            .get_or_try_init(|| async {
                let raw = self.queries.schema(board).await?;
                Ok::<_, Error>(raw.map(|columns| Arc::new(BoardSchema::from_raw(columns))))
            })
            .await?;

        loaded.clone().ok_or(Error::MissingSchema(board))
    }

    /// Look up a column on a board, fetching the schema if needed.
    pub async fn column(&self, board: BoardId, column: &str) -> Result<ColumnDef> {
        let schema = self.board(board).await?;
        schema
            .column(column)
            .cloned()
            .ok_or_else(|| Error::MissingColumn {
                board,
                column: column.to_string(),
            })
    }

    /// Synchronous lookup of an already-cached schema (strategy selection
    /// consults this and never triggers a fetch).
    pub fn cached(&self, board: BoardId) -> Option<Arc<BoardSchema>> {
        let boards = self.boards.lock().unwrap();
        boards
            .get(&board)
            .and_then(|entry| entry.cell.get())
            .and_then(|loaded| loaded.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::client::{QueryClient, QueryRequest, QueryResponse};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingClient {
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl QueryClient for CountingClient {
        async fn query(
            &self,
            request: QueryRequest,
        ) -> std::result::Result<QueryResponse, crate::client::ClientError> {
            match request {
                QueryRequest::BoardSchema { board } => {
                    self.fetches.fetch_add(1, Ordering::SeqCst);
                    if board == 999 {
                        return Ok(QueryResponse::BoardSchema(None));
                    }
                    Ok(QueryResponse::BoardSchema(Some(vec![RawColumnDef {
                        id: "numbers1".into(),
                        title: "Numbers".into(),
                        kind: "number".into(),
                        settings: None,
                    }])))
                }
                _ => unreachable!("schema cache only issues schema queries"),
            }
        }
    }

    fn cache(client: Arc<CountingClient>) -> SchemaCache {
        let queries = Queries::new(client, CancelToken::new());
        SchemaCache::new(queries, Duration::from_secs(300))
    }

    #[tokio::test]
    async fn test_single_fetch_per_board() {
        let client = Arc::new(CountingClient {
            fetches: AtomicUsize::new(0),
        });
        let cache = cache(Arc::clone(&client));

        let a = cache.board(123).await.unwrap();
        let b = cache.board(123).await.unwrap();
        assert_eq!(a.len(), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(client.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_fetch_dedup() {
        let client = Arc::new(CountingClient {
            fetches: AtomicUsize::new(0),
        });
        let cache = Arc::new(cache(Arc::clone(&client)));

        let (a, b) = tokio::join!(cache.board(123), cache.board(123));
        a.unwrap();
        b.unwrap();
        assert_eq!(client.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_board() {
        let client = Arc::new(CountingClient {
            fetches: AtomicUsize::new(0),
        });
        let cache = cache(client);

        match cache.board(999).await {
            Err(Error::MissingSchema(999)) => {}
            other => panic!("expected MissingSchema, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_missing_column() {
        let client = Arc::new(CountingClient {
            fetches: AtomicUsize::new(0),
        });
        let cache = cache(client);

        match cache.column(123, "ghost").await {
            Err(Error::MissingColumn { board: 123, column }) => {
                assert_eq!(column, "ghost");
            }
            other => panic!("expected MissingColumn, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_cached_is_sync_and_negative_before_fetch() {
        let client = Arc::new(CountingClient {
            fetches: AtomicUsize::new(0),
        });
        let cache = cache(client);

        assert!(cache.cached(123).is_none());
        cache.board(123).await.unwrap();
        assert!(cache.cached(123).is_some());
    }
}
