//! Board schema types
//!
//! A board's schema is an ordered list of [`ColumnDef`]s. Column kinds and
//! settings arrive from the platform as strings and JSON objects; decoding
//! is tolerant — unknown kinds and malformed settings degrade to defaults
//! rather than failing a resolve.

use serde::Deserialize;

use crate::key::{BoardId, ColumnId};

/// The closed set of column kinds the extractor knows how to normalise.
///
/// Kinds not in this set decode to [`ColumnKind::Unknown`] and fall back to
/// raw text extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    Text,
    LongText,
    Number,
    Date,
    Time,
    Timeline,
    Week,
    Hour,
    Status,
    Dropdown,
    People,
    Checkbox,
    Rating,
    Vote,
    Country,
    Email,
    Link,
    Phone,
    Location,
    ItemId,
    CreationLog,
    LastUpdated,
    TimeTracking,
    BoardRelation,
    Dependency,
    Mirror,
    Lookup,
    Formula,
    WorldClock,
    Unknown,
}

impl ColumnKind {
    /// Parse a wire kind string. Unknown strings yield [`ColumnKind::Unknown`].
    pub fn parse(s: &str) -> Self {
        match s {
            "text" => ColumnKind::Text,
            "long_text" | "long-text" => ColumnKind::LongText,
            "number" | "numbers" | "numeric" => ColumnKind::Number,
            "date" => ColumnKind::Date,
            "time" => ColumnKind::Time,
            "timeline" => ColumnKind::Timeline,
            "week" => ColumnKind::Week,
            "hour" => ColumnKind::Hour,
            "status" | "color" => ColumnKind::Status,
            "dropdown" => ColumnKind::Dropdown,
            "people" | "multiple-person" => ColumnKind::People,
            "checkbox" | "boolean" => ColumnKind::Checkbox,
            "rating" => ColumnKind::Rating,
            "vote" | "votes" => ColumnKind::Vote,
            "country" => ColumnKind::Country,
            "email" => ColumnKind::Email,
            "link" => ColumnKind::Link,
            "phone" => ColumnKind::Phone,
            "location" => ColumnKind::Location,
            "item_id" | "pulse-id" => ColumnKind::ItemId,
            "creation_log" | "pulse-log" => ColumnKind::CreationLog,
            "last_updated" | "pulse-updated" => ColumnKind::LastUpdated,
            "time_tracking" | "duration" => ColumnKind::TimeTracking,
            "board_relation" | "board-relation" => ColumnKind::BoardRelation,
            "dependency" => ColumnKind::Dependency,
            "mirror" => ColumnKind::Mirror,
            "lookup" => ColumnKind::Lookup,
            "formula" => ColumnKind::Formula,
            "world_clock" | "timezone" => ColumnKind::WorldClock,
            _ => ColumnKind::Unknown,
        }
    }

    /// Numeric kinds get `0` as their smart default and qualify for the
    /// second-chance numeric fetch.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ColumnKind::Number | ColumnKind::Rating | ColumnKind::Vote
        )
    }

    /// Complex kinds require recursive resolution: the platform's cached
    /// display value for them is unreliable.
    pub fn is_complex(&self) -> bool {
        matches!(
            self,
            ColumnKind::Formula | ColumnKind::Mirror | ColumnKind::Lookup
        )
    }
}

/// Numeric aggregation applied to a mirror's resolved children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MirrorFunction {
    Sum,
    #[serde(alias = "avg")]
    Average,
    Count,
    Min,
    Max,
    #[default]
    None,
}

impl MirrorFunction {
    /// Whether this aggregation produces a number.
    pub fn is_numeric(&self) -> bool {
        !matches!(self, MirrorFunction::None)
    }

    /// The smart default for an absent value under this aggregation.
    /// Only the additive aggregations default to zero.
    pub fn numeric_default(&self) -> Option<f64> {
        match self {
            MirrorFunction::Sum | MirrorFunction::Average | MirrorFunction::Count => Some(0.0),
            _ => None,
        }
    }

    /// Apply the aggregation to a list of numbers.
    pub fn apply(&self, values: &[f64]) -> f64 {
        match self {
            MirrorFunction::Sum | MirrorFunction::None => values.iter().sum(),
            MirrorFunction::Average => {
                if values.is_empty() {
                    0.0
                } else {
                    values.iter().sum::<f64>() / values.len() as f64
                }
            }
            MirrorFunction::Count => values.len() as f64,
            MirrorFunction::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            MirrorFunction::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// A mirror's target: one board and the columns displayed from it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct LinkedColumnTarget {
    #[serde(alias = "linked_board_id")]
    pub board_id: BoardId,
    #[serde(default, alias = "linked_column_ids")]
    pub column_ids: Vec<ColumnId>,
}

/// Decoded column settings.
///
/// Only the fields the resolver consumes are modelled; everything else in
/// the settings object is ignored.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ColumnSettings {
    /// Formula source text, for `formula` columns.
    #[serde(default)]
    pub formula: Option<String>,
    /// Aggregation applied to mirrored values.
    #[serde(default, alias = "aggregation")]
    pub function: MirrorFunction,
    /// Mirror targets, in display order.
    #[serde(default)]
    pub displayed_linked_columns: Vec<LinkedColumnTarget>,
    /// The board_relation column traversed to reach linked items.
    #[serde(default)]
    pub relation_column: Option<ColumnId>,
}

/// A column definition from a board schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub id: ColumnId,
    pub title: String,
    pub kind: ColumnKind,
    pub settings: ColumnSettings,
}

impl ColumnDef {
    /// Decode a column from its wire representation. Never fails: unknown
    /// kinds and undecodable settings degrade to defaults.
    pub fn decode(
        id: impl Into<ColumnId>,
        title: impl Into<String>,
        kind: &str,
        settings: Option<serde_json::Value>,
    ) -> Self {
        let id = id.into();
        let settings = match settings {
            Some(value) if !value.is_null() => {
                serde_json::from_value(value).unwrap_or_default()
            }
            _ => ColumnSettings::default(),
        };
        Self {
            id,
            title: title.into(),
            kind: ColumnKind::parse(kind),
            settings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_parse() {
        assert_eq!(ColumnKind::parse("number"), ColumnKind::Number);
        assert_eq!(ColumnKind::parse("board_relation"), ColumnKind::BoardRelation);
        assert_eq!(ColumnKind::parse("lookup"), ColumnKind::Lookup);
        assert_eq!(ColumnKind::parse("hologram"), ColumnKind::Unknown);
    }

    #[test]
    fn test_complex_kinds() {
        assert!(ColumnKind::Formula.is_complex());
        assert!(ColumnKind::Mirror.is_complex());
        assert!(ColumnKind::Lookup.is_complex());
        assert!(!ColumnKind::Number.is_complex());
    }

    #[test]
    fn test_settings_decode() {
        let def = ColumnDef::decode(
            "mirror1",
            "Mirror",
            "mirror",
            Some(json!({
                "function": "sum",
                "displayed_linked_columns": [
                    { "board_id": 456, "column_ids": ["numbers1"] }
                ],
                "relation_column": "connect1"
            })),
        );
        assert_eq!(def.kind, ColumnKind::Mirror);
        assert_eq!(def.settings.function, MirrorFunction::Sum);
        assert_eq!(def.settings.displayed_linked_columns[0].board_id, 456);
        assert_eq!(
            def.settings.displayed_linked_columns[0].column_ids,
            vec!["numbers1".to_string()]
        );
        assert_eq!(def.settings.relation_column.as_deref(), Some("connect1"));
    }

    #[test]
    fn test_settings_decode_tolerant() {
        // Malformed settings fall back to defaults instead of failing
        let def = ColumnDef::decode("x", "X", "formula", Some(json!("not an object")));
        assert_eq!(def.settings, ColumnSettings::default());

        let def = ColumnDef::decode("x", "X", "formula", None);
        assert!(def.settings.formula.is_none());
    }

    #[test]
    fn test_mirror_function_apply() {
        assert_eq!(MirrorFunction::Sum.apply(&[10.0, 20.0, 30.0]), 60.0);
        assert_eq!(MirrorFunction::Average.apply(&[10.0, 20.0]), 15.0);
        assert_eq!(MirrorFunction::Count.apply(&[1.0, 2.0, 3.0]), 3.0);
        assert_eq!(MirrorFunction::Min.apply(&[5.0, 2.0, 9.0]), 2.0);
        assert_eq!(MirrorFunction::Max.apply(&[5.0, 2.0, 9.0]), 9.0);
    }

    #[test]
    fn test_avg_alias() {
        let settings: ColumnSettings =
            serde_json::from_value(json!({ "function": "avg" })).unwrap();
        assert_eq!(settings.function, MirrorFunction::Average);
    }
}
