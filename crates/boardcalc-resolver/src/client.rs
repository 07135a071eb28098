//! The remote query capability
//!
//! The resolver core consumes a single [`QueryClient`] capability. The five
//! request documents and their response payloads are modelled as sum types;
//! transport, chunk retries and auth belong to the implementor.
//!
//! Raw column payloads come in many shapes; they are normalised into the
//! [`ColumnValue`] sum type with a raw-text catch-all for forward
//! compatibility.

use async_trait::async_trait;

use boardcalc_core::{BoardId, ColumnId, ItemId};

/// Error type surfaced by a [`QueryClient`] implementation.
pub type ClientError = Box<dyn std::error::Error + Send + Sync>;

/// The five request documents the core issues. Nothing else crosses the
/// client boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryRequest {
    /// Full column schema of a board.
    BoardSchema { board: BoardId },
    /// The platform's cached display value for one column of one item.
    DisplayValue {
        board: BoardId,
        item: ItemId,
        column: ColumnId,
    },
    /// Display values for one column across many items. Callers chunk at
    /// 100 items per request.
    DisplayValueBatch {
        board: BoardId,
        items: Vec<ItemId>,
        column: ColumnId,
    },
    /// Display value plus linked items for a mirror column.
    DeepMirror {
        board: BoardId,
        item: ItemId,
        column: ColumnId,
    },
    /// Shaped records for several columns of one item.
    ItemColumnsDeep {
        board: BoardId,
        item: ItemId,
        columns: Vec<ColumnId>,
    },
}

/// Response payloads, one variant per request document.
#[derive(Debug, Clone)]
pub enum QueryResponse {
    /// `None` when the board is unknown to the platform.
    BoardSchema(Option<Vec<RawColumnDef>>),
    DisplayValue(DisplayValueRecord),
    DisplayValueBatch(Vec<(ItemId, DisplayValueRecord)>),
    DeepMirror(DeepMirrorRecord),
    ItemColumnsDeep(Vec<ColumnRecord>),
}

/// A column definition as delivered by the platform: kind as a string and
/// settings as an undecoded JSON object.
#[derive(Debug, Clone)]
pub struct RawColumnDef {
    pub id: String,
    pub title: String,
    pub kind: String,
    pub settings: Option<serde_json::Value>,
}

/// Display-value record for a single column of a single item.
#[derive(Debug, Clone, Default)]
pub struct DisplayValueRecord {
    pub kind: String,
    pub text: Option<String>,
    /// Populated for numeric columns.
    pub number: Option<f64>,
    /// The platform's precomputed display string; may be empty or stale.
    pub display_value: Option<String>,
}

/// Deep-mirror record: the cached display value and the linked items
/// reached through the mirror's relation column.
#[derive(Debug, Clone, Default)]
pub struct DeepMirrorRecord {
    pub display_value: Option<String>,
    pub mirrored_items: Vec<MirroredItem>,
}

#[derive(Debug, Clone)]
pub struct MirroredItem {
    pub linked_board_id: BoardId,
    pub linked_item: LinkedItem,
}

#[derive(Debug, Clone)]
pub struct LinkedItem {
    pub id: ItemId,
    pub name: String,
}

/// One shaped column record from a multi-column deep query.
#[derive(Debug, Clone)]
pub struct ColumnRecord {
    pub column_id: ColumnId,
    pub value: ColumnValue,
}

/// The raw value shapes the upstream data API returns, normalised into a
/// closed sum. Kinds whose payload is a plain string share [`Text`];
/// anything unrecognised arrives as [`Raw`].
///
/// [`Text`]: ColumnValue::Text
/// [`Raw`]: ColumnValue::Raw
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    /// No value set.
    Absent,
    /// Canonical text payload (text, long_text, email, link, phone, ...).
    Text(String),
    /// Numeric payload with its display text.
    Number { number: Option<f64>, text: String },
    /// Civil date with optional time-of-day, both as wire strings.
    Date {
        date: Option<String>,
        time: Option<String>,
    },
    /// Hour-of-day payload.
    Hour { hour: u32, minute: u32 },
    /// Status label.
    Status { label: String },
    /// Dropdown labels.
    Labels(Vec<String>),
    /// Assigned people names.
    People(Vec<String>),
    /// Checkbox state.
    Checkbox { checked: bool },
    /// Timeline range, as wire date strings.
    Timeline { from: String, to: String },
    /// Tracked duration in seconds.
    TimeTracking { duration_seconds: u64 },
    /// Linked item names (board_relation, dependency).
    Relation { names: Vec<String> },
    /// Mirror payload from a deep query.
    Mirror {
        display_value: Option<String>,
        linked_names: Vec<String>,
    },
    /// Catch-all for unknown shapes.
    Raw(String),
}

/// The upstream query capability.
///
/// The core calls this concurrently and assumes it is safe under concurrent
/// use. Implementations should answer each request variant with the
/// matching response variant; anything else is treated as a remote error.
#[async_trait]
pub trait QueryClient: Send + Sync {
    async fn query(&self, request: QueryRequest) -> Result<QueryResponse, ClientError>;
}
