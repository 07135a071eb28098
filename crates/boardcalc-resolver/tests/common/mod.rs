//! Shared test fixtures: an in-memory query client that records every
//! request it serves, so tests can assert on remote call counts.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use boardcalc_resolver::{
    ColumnRecord, ColumnValue, DeepMirrorRecord, DisplayValueRecord, QueryClient, QueryRequest,
    QueryResponse, RawColumnDef,
};

type BoardId = u64;
type ItemId = u64;

#[derive(Default)]
pub struct MockBoard {
    columns: Vec<RawColumnDef>,
    display: HashMap<(ItemId, String), DisplayValueRecord>,
    deep: HashMap<(ItemId, String), ColumnValue>,
    mirrors: HashMap<(ItemId, String), DeepMirrorRecord>,
}

impl MockBoard {
    pub fn column(mut self, id: &str, kind: &str, settings: Option<Value>) -> Self {
        self.columns.push(RawColumnDef {
            id: id.to_string(),
            title: id.to_string(),
            kind: kind.to_string(),
            settings,
        });
        self
    }

    pub fn display(mut self, item: ItemId, column: &str, record: DisplayValueRecord) -> Self {
        self.display.insert((item, column.to_string()), record);
        self
    }

    /// Shorthand: a numeric display-value record.
    pub fn number(self, item: ItemId, column: &str, n: f64) -> Self {
        self.display(
            item,
            column,
            DisplayValueRecord {
                kind: "number".into(),
                text: None,
                number: Some(n),
                display_value: None,
            },
        )
    }

    /// Shorthand: a text display-value record.
    pub fn text(self, item: ItemId, column: &str, s: &str) -> Self {
        self.display(
            item,
            column,
            DisplayValueRecord {
                kind: "text".into(),
                text: Some(s.to_string()),
                number: None,
                display_value: None,
            },
        )
    }

    /// A deep (multi-column query) value for one column of one item.
    pub fn deep(mut self, item: ItemId, column: &str, value: ColumnValue) -> Self {
        self.deep.insert((item, column.to_string()), value);
        self
    }

    pub fn mirror(mut self, item: ItemId, column: &str, record: DeepMirrorRecord) -> Self {
        self.mirrors.insert((item, column.to_string()), record);
        self
    }
}

#[derive(Default)]
pub struct MockClient {
    boards: HashMap<BoardId, MockBoard>,
    delay_ms: u64,
    pub calls: Mutex<Vec<QueryRequest>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn board(mut self, id: BoardId, board: MockBoard) -> Self {
        self.boards.insert(id, board);
        self
    }

    /// Delay every request, so tests can overlap concurrent resolutions.
    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn call_count(&self, pred: impl Fn(&QueryRequest) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|r| pred(r)).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl QueryClient for MockClient {
    async fn query(
        &self,
        request: QueryRequest,
    ) -> Result<QueryResponse, Box<dyn std::error::Error + Send + Sync>> {
        self.calls.lock().unwrap().push(request.clone());
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }

        match request {
            QueryRequest::BoardSchema { board } => {
                Ok(QueryResponse::BoardSchema(self.boards.get(&board).map(
                    |b| b.columns.clone(),
                )))
            }
            QueryRequest::DisplayValue {
                board,
                item,
                column,
            } => {
                let record = self
                    .boards
                    .get(&board)
                    .and_then(|b| b.display.get(&(item, column)))
                    .cloned()
                    .unwrap_or_default();
                Ok(QueryResponse::DisplayValue(record))
            }
            QueryRequest::DisplayValueBatch {
                board,
                items,
                column,
            } => {
                let records = items
                    .into_iter()
                    .map(|item| {
                        let record = self
                            .boards
                            .get(&board)
                            .and_then(|b| b.display.get(&(item, column.clone())))
                            .cloned()
                            .unwrap_or_default();
                        (item, record)
                    })
                    .collect();
                Ok(QueryResponse::DisplayValueBatch(records))
            }
            QueryRequest::DeepMirror {
                board,
                item,
                column,
            } => {
                let record = self
                    .boards
                    .get(&board)
                    .and_then(|b| b.mirrors.get(&(item, column)))
                    .cloned()
                    .unwrap_or_default();
                Ok(QueryResponse::DeepMirror(record))
            }
            QueryRequest::ItemColumnsDeep {
                board,
                item,
                columns,
            } => {
                let records = columns
                    .into_iter()
                    .filter_map(|column_id| {
                        self.boards
                            .get(&board)
                            .and_then(|b| b.deep.get(&(item, column_id.clone())))
                            .cloned()
                            .map(|value| ColumnRecord { column_id, value })
                    })
                    .collect();
                Ok(QueryResponse::ItemColumnsDeep(records))
            }
        }
    }
}

/// A client that fails every request, for error-propagation tests.
pub struct FailingClient;

#[async_trait]
impl QueryClient for FailingClient {
    async fn query(
        &self,
        _request: QueryRequest,
    ) -> Result<QueryResponse, Box<dyn std::error::Error + Send + Sync>> {
        Err("upstream unavailable".into())
    }
}
