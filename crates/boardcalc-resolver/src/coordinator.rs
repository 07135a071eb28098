//! Request coordinator
//!
//! Micro-batches sibling column requests for the same item. The first
//! requester of an `(board, item)` pair opens a batch and owns its window
//! timer; requests arriving inside the window join the batch. On window
//! close (or [`Coordinator::flush`], or cancellation) the leader issues one
//! multi-column deep query and distributes per-column results to every
//! subscriber.
//!
//! The batch window is a latency-vs-batching knob, not a correctness knob:
//! a zero window still produces correct results, just smaller batches.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{oneshot, Notify};
use tokio::time::sleep;

use boardcalc_core::{BoardId, ColumnId, Error, ItemId, Result};

use crate::cancel::CancelToken;
use crate::client::ColumnValue;
use crate::query::Queries;
use crate::SharedError;

type BatchReply = std::result::Result<Option<ColumnValue>, SharedError>;

struct Batch {
    requests: Mutex<Vec<(ColumnId, oneshot::Sender<BatchReply>)>>,
    fire: Notify,
}

impl Batch {
    fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            fire: Notify::new(),
        }
    }
}

/// Per-session micro-batch coordinator keyed by `(board, item)`.
pub struct Coordinator {
    queries: Queries,
    cancel: CancelToken,
    window: Duration,
    batches: Mutex<HashMap<(BoardId, ItemId), Arc<Batch>>>,
}

impl Coordinator {
    pub fn new(queries: Queries, cancel: CancelToken, window: Duration) -> Self {
        Self {
            queries,
            cancel,
            window,
            batches: Mutex::new(HashMap::new()),
        }
    }

    /// Request one column of one item through the batch window.
    ///
    /// Returns `Ok(None)` when the remote answered but had no record for
    /// the column; callers treat that like an empty value.
    pub async fn request(
        &self,
        board: BoardId,
        item: ItemId,
        column: &str,
    ) -> Result<Option<ColumnValue>> {
        let (tx, rx) = oneshot::channel();

        let leader = {
            let mut batches = self.batches.lock().unwrap();
            match batches.get(&(board, item)) {
                Some(batch) => {
                    batch
                        .requests
                        .lock()
                        .unwrap()
                        .push((column.to_string(), tx));
                    None
                }
                None => {
                    let batch = Arc::new(Batch::new());
                    batch
                        .requests
                        .lock()
                        .unwrap()
                        .push((column.to_string(), tx));
                    batches.insert((board, item), Arc::clone(&batch));
                    Some(batch)
                }
            }
        };

        if let Some(batch) = leader {
            self.lead(board, item, batch).await;
        }

        match rx.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(shared)) => Err(shared.to_error()),
            // The leader was dropped before distributing
            Err(_) => Err(Error::Cancelled),
        }
    }

    /// Drive one batch: wait out the window, close the batch, issue the
    /// query, distribute results.
    async fn lead(&self, board: BoardId, item: ItemId, batch: Arc<Batch>) {
        let mut cancelled = false;
        tokio::select! {
            _ = sleep(self.window) => {}
            _ = batch.fire.notified() => {}
            _ = self.cancel.cancelled() => { cancelled = true; }
        }

        // Close the batch before draining so late arrivals start a new one
        self.batches.lock().unwrap().remove(&(board, item));
        let requests: Vec<(ColumnId, oneshot::Sender<BatchReply>)> =
            std::mem::take(&mut *batch.requests.lock().unwrap());

        if cancelled {
            let shared = SharedError::new(Error::Cancelled);
            for (_, tx) in requests {
                let _ = tx.send(Err(shared.clone()));
            }
            return;
        }

        let mut columns: Vec<ColumnId> = requests.iter().map(|(c, _)| c.clone()).collect();
        columns.sort();
        columns.dedup();

        tracing::debug!(board, item, count = columns.len(), "coordinator batch firing");

        match self.queries.item_columns_deep(board, item, columns).await {
            Ok(records) => {
                let by_column: HashMap<&str, &ColumnValue> = records
                    .iter()
                    .map(|r| (r.column_id.as_str(), &r.value))
                    .collect();
                for (column, tx) in requests {
                    let value = by_column.get(column.as_str()).map(|v| (*v).clone());
                    let _ = tx.send(Ok(value));
                }
            }
            Err(e) => {
                let shared = SharedError::new(e);
                for (_, tx) in requests {
                    let _ = tx.send(Err(shared.clone()));
                }
            }
        }
    }

    /// Force every open batch to fire immediately.
    pub fn flush(&self) {
        let batches = self.batches.lock().unwrap();
        for batch in batches.values() {
            batch.fire.notify_one();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{
        ColumnRecord, QueryClient, QueryRequest, QueryResponse,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct DeepClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl QueryClient for DeepClient {
        async fn query(
            &self,
            request: QueryRequest,
        ) -> std::result::Result<QueryResponse, crate::client::ClientError> {
            match request {
                QueryRequest::ItemColumnsDeep { columns, .. } => {
                    self.calls.fetch_add(1, Ordering::SeqCst);
                    let records = columns
                        .into_iter()
                        .map(|column_id| ColumnRecord {
                            value: ColumnValue::Text(format!("v:{column_id}")),
                            column_id,
                        })
                        .collect();
                    Ok(QueryResponse::ItemColumnsDeep(records))
                }
                _ => unreachable!("coordinator only issues deep queries"),
            }
        }
    }

    fn coordinator(client: Arc<DeepClient>, window_ms: u64) -> Arc<Coordinator> {
        let cancel = CancelToken::new();
        let queries = Queries::new(client, cancel.clone());
        Arc::new(Coordinator::new(
            queries,
            cancel,
            Duration::from_millis(window_ms),
        ))
    }

    #[tokio::test]
    async fn test_sibling_requests_coalesce() {
        let client = Arc::new(DeepClient {
            calls: AtomicUsize::new(0),
        });
        let coord = coordinator(Arc::clone(&client), 5);

        let a = {
            let coord = Arc::clone(&coord);
            tokio::spawn(async move { coord.request(123, 100, "a").await })
        };
        let b = {
            let coord = Arc::clone(&coord);
            tokio::spawn(async move { coord.request(123, 100, "b").await })
        };

        let a = a.await.unwrap().unwrap();
        let b = b.await.unwrap().unwrap();

        assert_eq!(a, Some(ColumnValue::Text("v:a".into())));
        assert_eq!(b, Some(ColumnValue::Text("v:b".into())));
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_items_get_separate_batches() {
        let client = Arc::new(DeepClient {
            calls: AtomicUsize::new(0),
        });
        let coord = coordinator(Arc::clone(&client), 1);

        let (a, b) = tokio::join!(
            coord.request(123, 100, "a"),
            coord.request(123, 200, "a")
        );
        a.unwrap();
        b.unwrap();
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_window_still_correct() {
        let client = Arc::new(DeepClient {
            calls: AtomicUsize::new(0),
        });
        let coord = coordinator(Arc::clone(&client), 0);

        let value = coord.request(123, 100, "a").await.unwrap();
        assert_eq!(value, Some(ColumnValue::Text("v:a".into())));
    }

    #[tokio::test]
    async fn test_missing_column_is_none() {
        struct EmptyClient;

        #[async_trait]
        impl QueryClient for EmptyClient {
            async fn query(
                &self,
                _request: QueryRequest,
            ) -> std::result::Result<QueryResponse, crate::client::ClientError> {
                Ok(QueryResponse::ItemColumnsDeep(vec![]))
            }
        }

        let cancel = CancelToken::new();
        let queries = Queries::new(Arc::new(EmptyClient), cancel.clone());
        let coord = Coordinator::new(queries, cancel, Duration::from_millis(1));

        let value = coord.request(123, 100, "ghost").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_cancelled_batch_rejects_subscribers() {
        let client = Arc::new(DeepClient {
            calls: AtomicUsize::new(0),
        });
        let cancel = CancelToken::new();
        let queries = Queries::new(Arc::clone(&client) as Arc<dyn QueryClient>, cancel.clone());
        let coord = Arc::new(Coordinator::new(
            queries,
            cancel.clone(),
            Duration::from_secs(60),
        ));

        let pending = {
            let coord = Arc::clone(&coord);
            tokio::spawn(async move { coord.request(123, 100, "a").await })
        };

        // Give the leader time to open its window, then cancel
        tokio::task::yield_now().await;
        cancel.cancel();

        match pending.await.unwrap() {
            Err(Error::Cancelled) => {}
            other => panic!("expected Cancelled, got {:?}", other.map(|_| ())),
        }
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_flush_fires_immediately() {
        let client = Arc::new(DeepClient {
            calls: AtomicUsize::new(0),
        });
        let coord = coordinator(Arc::clone(&client), 60_000);

        let pending = {
            let coord = Arc::clone(&coord);
            tokio::spawn(async move { coord.request(123, 100, "a").await })
        };

        // Let the leader register its batch, then force it
        tokio::task::yield_now().await;
        coord.flush();

        let value = pending.await.unwrap().unwrap();
        assert_eq!(value, Some(ColumnValue::Text("v:a".into())));
    }
}
