//! Typed query layer
//!
//! Thin helpers over the raw [`QueryClient`] capability: each issues one
//! request document, races it against the session's cancellation token and
//! unwraps the matching response variant. Batch display-value queries are
//! chunked at 100 items per request.

use std::collections::HashMap;
use std::sync::Arc;

use boardcalc_core::{BoardId, ColumnId, Error, ItemId, Result};

use crate::cancel::CancelToken;
use crate::client::{
    ColumnRecord, DeepMirrorRecord, DisplayValueRecord, QueryClient, QueryRequest, QueryResponse,
    RawColumnDef,
};

const BATCH_CHUNK: usize = 100;

/// The session's handle on the remote: client + cancellation.
#[derive(Clone)]
pub struct Queries {
    client: Arc<dyn QueryClient>,
    cancel: CancelToken,
}

impl Queries {
    pub fn new(client: Arc<dyn QueryClient>, cancel: CancelToken) -> Self {
        Self { client, cancel }
    }

    async fn run(&self, request: QueryRequest) -> Result<QueryResponse> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            response = self.client.query(request) => response.map_err(Error::Remote),
        }
    }

    /// Fetch a board's full column schema. `Ok(None)` means the board is
    /// unknown to the platform.
    pub async fn schema(&self, board: BoardId) -> Result<Option<Vec<RawColumnDef>>> {
        match self.run(QueryRequest::BoardSchema { board }).await? {
            QueryResponse::BoardSchema(columns) => Ok(columns),
            other => Err(shape_error("BoardSchema", &other)),
        }
    }

    pub async fn display_value(
        &self,
        board: BoardId,
        item: ItemId,
        column: &str,
    ) -> Result<DisplayValueRecord> {
        let request = QueryRequest::DisplayValue {
            board,
            item,
            column: column.to_string(),
        };
        match self.run(request).await? {
            QueryResponse::DisplayValue(record) => Ok(record),
            other => Err(shape_error("DisplayValue", &other)),
        }
    }

    /// Batched display values, chunked at 100 items per remote call.
    pub async fn display_value_batch(
        &self,
        board: BoardId,
        items: &[ItemId],
        column: &str,
    ) -> Result<HashMap<ItemId, DisplayValueRecord>> {
        let mut out = HashMap::with_capacity(items.len());
        for chunk in items.chunks(BATCH_CHUNK) {
            let request = QueryRequest::DisplayValueBatch {
                board,
                items: chunk.to_vec(),
                column: column.to_string(),
            };
            match self.run(request).await? {
                QueryResponse::DisplayValueBatch(records) => {
                    out.extend(records);
                }
                other => return Err(shape_error("DisplayValueBatch", &other)),
            }
        }
        Ok(out)
    }

    pub async fn deep_mirror(
        &self,
        board: BoardId,
        item: ItemId,
        column: &str,
    ) -> Result<DeepMirrorRecord> {
        let request = QueryRequest::DeepMirror {
            board,
            item,
            column: column.to_string(),
        };
        match self.run(request).await? {
            QueryResponse::DeepMirror(record) => Ok(record),
            other => Err(shape_error("DeepMirror", &other)),
        }
    }

    pub async fn item_columns_deep(
        &self,
        board: BoardId,
        item: ItemId,
        columns: Vec<ColumnId>,
    ) -> Result<Vec<ColumnRecord>> {
        let request = QueryRequest::ItemColumnsDeep {
            board,
            item,
            columns,
        };
        match self.run(request).await? {
            QueryResponse::ItemColumnsDeep(records) => Ok(records),
            other => Err(shape_error("ItemColumnsDeep", &other)),
        }
    }
}

fn shape_error(expected: &str, got: &QueryResponse) -> Error {
    let got = match got {
        QueryResponse::BoardSchema(_) => "BoardSchema",
        QueryResponse::DisplayValue(_) => "DisplayValue",
        QueryResponse::DisplayValueBatch(_) => "DisplayValueBatch",
        QueryResponse::DeepMirror(_) => "DeepMirror",
        QueryResponse::ItemColumnsDeep(_) => "ItemColumnsDeep",
    };
    Error::remote_msg(format!(
        "client answered {expected} request with {got} payload"
    ))
}
