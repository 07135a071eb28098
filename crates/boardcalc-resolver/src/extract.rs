//! Column-value extraction
//!
//! Deterministic per-kind mapping from raw column payloads to scalars, held
//! in a lookup table keyed by [`ColumnKind`]. Absent values get smart
//! defaults: empty for text-like kinds, 0 for numeric kinds and for mirrors
//! under additive aggregation.

use std::collections::HashMap;
use std::sync::OnceLock;

use boardcalc_core::scalar::parse_number_lenient;
use boardcalc_core::{ColumnDef, ColumnKind, DateValue, Scalar};

use crate::client::{ColumnValue, DisplayValueRecord};

/// Extractor implementation signature
pub type ExtractorImpl = fn(&ColumnValue, &ColumnDef) -> Scalar;

/// Per-kind extractor lookup table.
pub struct ExtractorRegistry {
    handlers: HashMap<ColumnKind, ExtractorImpl>,
}

static EXTRACTOR_REGISTRY: OnceLock<ExtractorRegistry> = OnceLock::new();

/// The process-wide extractor table (pure functions only).
pub fn registry() -> &'static ExtractorRegistry {
    EXTRACTOR_REGISTRY.get_or_init(ExtractorRegistry::new)
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        let mut handlers: HashMap<ColumnKind, ExtractorImpl> = HashMap::new();

        for kind in [
            ColumnKind::Text,
            ColumnKind::LongText,
            ColumnKind::Week,
            ColumnKind::Country,
            ColumnKind::Email,
            ColumnKind::Link,
            ColumnKind::Phone,
            ColumnKind::Location,
            ColumnKind::ItemId,
            ColumnKind::CreationLog,
            ColumnKind::LastUpdated,
            ColumnKind::Time,
            ColumnKind::WorldClock,
        ] {
            handlers.insert(kind, extract_text);
        }

        for kind in [ColumnKind::Number, ColumnKind::Rating, ColumnKind::Vote] {
            handlers.insert(kind, extract_number);
        }

        handlers.insert(ColumnKind::Date, extract_date);
        handlers.insert(ColumnKind::Hour, extract_hour);
        handlers.insert(ColumnKind::Status, extract_status);
        handlers.insert(ColumnKind::Dropdown, extract_names);
        handlers.insert(ColumnKind::People, extract_names);
        handlers.insert(ColumnKind::BoardRelation, extract_names);
        handlers.insert(ColumnKind::Dependency, extract_names);
        handlers.insert(ColumnKind::Checkbox, extract_checkbox);
        handlers.insert(ColumnKind::Timeline, extract_timeline);
        handlers.insert(ColumnKind::TimeTracking, extract_time_tracking);
        handlers.insert(ColumnKind::Mirror, extract_mirror);
        handlers.insert(ColumnKind::Lookup, extract_mirror);

        Self { handlers }
    }

    /// Normalise a raw payload for the given column. Unknown kinds fall back
    /// to raw text; absent values get the kind's smart default.
    pub fn extract(&self, def: &ColumnDef, value: &ColumnValue) -> Scalar {
        if matches!(value, ColumnValue::Absent) {
            return default_for(def);
        }
        match self.handlers.get(&def.kind) {
            Some(handler) => handler(value, def),
            None => extract_text(value, def),
        }
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Smart default for an absent value: `0` for numeric kinds and for mirrors
/// under additive aggregation, `empty` otherwise.
pub fn default_for(def: &ColumnDef) -> Scalar {
    if def.kind.is_numeric() {
        return Scalar::Number(0.0);
    }
    if matches!(def.kind, ColumnKind::Mirror | ColumnKind::Lookup) {
        if let Some(default) = def.settings.function.numeric_default() {
            return Scalar::Number(default);
        }
    }
    Scalar::Empty
}

/// Normalise a display-value record (the fast-path query shape).
pub fn display_record(def: &ColumnDef, record: &DisplayValueRecord) -> Scalar {
    let text = record
        .display_value
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| record.text.as_deref().filter(|s| !s.trim().is_empty()));

    if def.kind.is_numeric() {
        if let Some(n) = record.number {
            return Scalar::Number(n);
        }
        return match text.and_then(parse_number_lenient) {
            Some(n) => Scalar::Number(n),
            None => Scalar::Empty,
        };
    }

    let text = match text {
        Some(t) => t,
        None => return Scalar::Empty,
    };

    match def.kind {
        ColumnKind::Date => match DateValue::parse(text) {
            Some(d) => Scalar::Date(d),
            None => Scalar::text(text),
        },
        ColumnKind::Checkbox => Scalar::Bool(text.eq_ignore_ascii_case("true")),
        _ => Scalar::text(text),
    }
}

// === per-kind handlers ===

fn raw_text(value: &ColumnValue) -> String {
    match value {
        ColumnValue::Text(s) | ColumnValue::Raw(s) => s.clone(),
        ColumnValue::Number { text, number } => {
            if text.is_empty() {
                number.map_or(String::new(), |n| Scalar::Number(n).to_string())
            } else {
                text.clone()
            }
        }
        ColumnValue::Status { label } => label.clone(),
        ColumnValue::Labels(names)
        | ColumnValue::People(names)
        | ColumnValue::Relation { names } => names.join(", "),
        ColumnValue::Checkbox { checked } => checked.to_string(),
        ColumnValue::Date { date, time } => join_date_text(date.as_deref(), time.as_deref()),
        ColumnValue::Timeline { from, to } => format!("{} - {}", from, to),
        ColumnValue::Hour { hour, minute } => format!("{:02}:{:02}", hour, minute),
        ColumnValue::TimeTracking { duration_seconds } => format_duration(*duration_seconds),
        ColumnValue::Mirror {
            display_value,
            linked_names,
        } => display_value
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| linked_names.join(", ")),
        ColumnValue::Absent => String::new(),
    }
}

fn join_date_text(date: Option<&str>, time: Option<&str>) -> String {
    match (date, time) {
        (Some(d), Some(t)) => format!("{} {}", d, t),
        (Some(d), None) => d.to_string(),
        _ => String::new(),
    }
}

fn extract_text(value: &ColumnValue, _def: &ColumnDef) -> Scalar {
    let s = raw_text(value);
    if s.is_empty() {
        Scalar::Empty
    } else {
        Scalar::Text(s)
    }
}

fn extract_number(value: &ColumnValue, _def: &ColumnDef) -> Scalar {
    match value {
        ColumnValue::Number {
            number: Some(n), ..
        } => Scalar::Number(*n),
        ColumnValue::Number { text, .. } => {
            Scalar::Number(parse_number_lenient(text).unwrap_or(0.0))
        }
        other => Scalar::Number(parse_number_lenient(&raw_text(other)).unwrap_or(0.0)),
    }
}

/// `date` or `date + " " + time` when a time is present.
fn extract_date(value: &ColumnValue, _def: &ColumnDef) -> Scalar {
    match value {
        ColumnValue::Date {
            date: Some(date),
            time,
        } => {
            let combined = join_date_text(Some(date), time.as_deref());
            match DateValue::parse(&combined) {
                Some(d) => Scalar::Date(d),
                None => Scalar::Text(combined),
            }
        }
        ColumnValue::Date { date: None, .. } => Scalar::Empty,
        other => match DateValue::parse(&raw_text(other)) {
            Some(d) => Scalar::Date(d),
            None => extract_text(other, _def),
        },
    }
}

/// `HH:MM`, zero-padded.
fn extract_hour(value: &ColumnValue, def: &ColumnDef) -> Scalar {
    match value {
        ColumnValue::Hour { hour, minute } => {
            Scalar::Text(format!("{:02}:{:02}", hour, minute))
        }
        other => extract_text(other, def),
    }
}

fn extract_status(value: &ColumnValue, def: &ColumnDef) -> Scalar {
    match value {
        ColumnValue::Status { label } if !label.is_empty() => Scalar::Text(label.clone()),
        ColumnValue::Status { .. } => Scalar::Empty,
        other => extract_text(other, def),
    }
}

/// Comma-joined labels/names (dropdown, people, board_relation, dependency).
fn extract_names(value: &ColumnValue, def: &ColumnDef) -> Scalar {
    match value {
        ColumnValue::Labels(names)
        | ColumnValue::People(names)
        | ColumnValue::Relation { names } => {
            if names.is_empty() {
                Scalar::Empty
            } else {
                Scalar::Text(names.join(", "))
            }
        }
        other => extract_text(other, def),
    }
}

fn extract_checkbox(value: &ColumnValue, _def: &ColumnDef) -> Scalar {
    match value {
        ColumnValue::Checkbox { checked } => Scalar::Bool(*checked),
        ColumnValue::Absent => Scalar::Empty,
        other => Scalar::Bool(raw_text(other).eq_ignore_ascii_case("true")),
    }
}

/// `from + " - " + to`.
fn extract_timeline(value: &ColumnValue, def: &ColumnDef) -> Scalar {
    match value {
        ColumnValue::Timeline { from, to } => Scalar::Text(format!("{} - {}", from, to)),
        other => extract_text(other, def),
    }
}

/// `H:MM` from tracked seconds.
fn extract_time_tracking(value: &ColumnValue, def: &ColumnDef) -> Scalar {
    match value {
        ColumnValue::TimeTracking { duration_seconds } => {
            Scalar::Text(format_duration(*duration_seconds))
        }
        other => extract_text(other, def),
    }
}

fn format_duration(seconds: u64) -> String {
    let minutes = seconds / 60;
    format!("{}:{:02}", minutes / 60, minutes % 60)
}

/// Mirror payloads carry either an aggregatable display value or the linked
/// item names.
fn extract_mirror(value: &ColumnValue, def: &ColumnDef) -> Scalar {
    match value {
        ColumnValue::Mirror {
            display_value,
            linked_names,
        } => {
            let function = def.settings.function;
            if let Some(dv) = display_value.as_deref().filter(|s| !s.trim().is_empty()) {
                if function.is_numeric() {
                    if let Some(numbers) = parse_numeric_list(dv) {
                        if numbers.len() == 1 {
                            return Scalar::Number(numbers[0]);
                        }
                        return Scalar::Number(function.apply(&numbers));
                    }
                }
                return Scalar::text(dv);
            }
            if !linked_names.is_empty() {
                return Scalar::Text(linked_names.join(", "));
            }
            default_for(def)
        }
        other => extract_text(other, def),
    }
}

/// Parse a comma-separated list in which every entry is numeric.
pub fn parse_numeric_list(s: &str) -> Option<Vec<f64>> {
    s.split(',')
        .map(|part| parse_number_lenient(part.trim()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardcalc_core::column::MirrorFunction;
    use serde_json::json;

    fn def(kind: &str) -> ColumnDef {
        ColumnDef::decode("c1", "C1", kind, None)
    }

    fn mirror_def(function: &str) -> ColumnDef {
        ColumnDef::decode("m1", "M1", "mirror", Some(json!({ "function": function })))
    }

    #[test]
    fn test_text_kinds() {
        let r = registry();
        assert_eq!(
            r.extract(&def("text"), &ColumnValue::Text("hello".into())),
            Scalar::text("hello")
        );
        assert_eq!(r.extract(&def("text"), &ColumnValue::Absent), Scalar::Empty);
    }

    #[test]
    fn test_number() {
        let r = registry();
        assert_eq!(
            r.extract(
                &def("number"),
                &ColumnValue::Number {
                    number: Some(42.0),
                    text: String::new()
                }
            ),
            Scalar::Number(42.0)
        );
        // Numeric-parsed text fallback
        assert_eq!(
            r.extract(
                &def("number"),
                &ColumnValue::Number {
                    number: None,
                    text: "17".into()
                }
            ),
            Scalar::Number(17.0)
        );
        // Unparseable falls back to 0
        assert_eq!(
            r.extract(
                &def("number"),
                &ColumnValue::Number {
                    number: None,
                    text: "n/a".into()
                }
            ),
            Scalar::Number(0.0)
        );
        // Absent defaults to 0
        assert_eq!(
            r.extract(&def("number"), &ColumnValue::Absent),
            Scalar::Number(0.0)
        );
    }

    #[test]
    fn test_date() {
        let r = registry();
        let value = ColumnValue::Date {
            date: Some("2024-03-07".into()),
            time: None,
        };
        assert_eq!(
            r.extract(&def("date"), &value),
            Scalar::Date(DateValue::parse("2024-03-07").unwrap())
        );

        let value = ColumnValue::Date {
            date: Some("2024-03-07".into()),
            time: Some("09:30:00".into()),
        };
        assert_eq!(
            r.extract(&def("date"), &value).to_string(),
            "2024-03-07 09:30:00"
        );
    }

    #[test]
    fn test_hour_and_time_tracking() {
        let r = registry();
        assert_eq!(
            r.extract(&def("hour"), &ColumnValue::Hour { hour: 9, minute: 5 }),
            Scalar::text("09:05")
        );
        assert_eq!(
            r.extract(
                &def("time_tracking"),
                &ColumnValue::TimeTracking {
                    duration_seconds: 3900
                }
            ),
            Scalar::text("1:05")
        );
    }

    #[test]
    fn test_status_and_names() {
        let r = registry();
        assert_eq!(
            r.extract(
                &def("status"),
                &ColumnValue::Status {
                    label: "Done".into()
                }
            ),
            Scalar::text("Done")
        );
        assert_eq!(
            r.extract(
                &def("people"),
                &ColumnValue::People(vec!["Ada".into(), "Grace".into()])
            ),
            Scalar::text("Ada, Grace")
        );
        assert_eq!(
            r.extract(
                &def("dropdown"),
                &ColumnValue::Labels(vec!["a".into(), "b".into()])
            ),
            Scalar::text("a, b")
        );
    }

    #[test]
    fn test_checkbox() {
        let r = registry();
        assert_eq!(
            r.extract(&def("checkbox"), &ColumnValue::Checkbox { checked: true }),
            Scalar::Bool(true)
        );
        assert_eq!(
            r.extract(&def("checkbox"), &ColumnValue::Checkbox { checked: false })
                .to_string(),
            "false"
        );
    }

    #[test]
    fn test_timeline() {
        let r = registry();
        assert_eq!(
            r.extract(
                &def("timeline"),
                &ColumnValue::Timeline {
                    from: "2024-01-01".into(),
                    to: "2024-02-01".into()
                }
            ),
            Scalar::text("2024-01-01 - 2024-02-01")
        );
    }

    #[test]
    fn test_mirror_aggregation() {
        let r = registry();
        let value = ColumnValue::Mirror {
            display_value: Some("10, 20, 30".into()),
            linked_names: vec![],
        };
        assert_eq!(r.extract(&mirror_def("sum"), &value), Scalar::Number(60.0));
        assert_eq!(
            r.extract(&mirror_def("average"), &value),
            Scalar::Number(20.0)
        );

        // Non-numeric display value joins through as text
        let value = ColumnValue::Mirror {
            display_value: None,
            linked_names: vec!["Project A".into(), "Project B".into()],
        };
        assert_eq!(
            r.extract(&mirror_def("none"), &value),
            Scalar::text("Project A, Project B")
        );

        // Absent mirror under additive aggregation defaults to 0
        assert_eq!(
            r.extract(&mirror_def("sum"), &ColumnValue::Absent),
            Scalar::Number(0.0)
        );
        assert_eq!(
            r.extract(&mirror_def("none"), &ColumnValue::Absent),
            Scalar::Empty
        );
        assert_eq!(
            r.extract(&mirror_def("max"), &ColumnValue::Absent),
            Scalar::Empty
        );
    }

    #[test]
    fn test_unknown_kind_raw_text() {
        let r = registry();
        assert_eq!(
            r.extract(&def("hologram"), &ColumnValue::Raw("???".into())),
            Scalar::text("???")
        );
    }

    #[test]
    fn test_numeric_list() {
        assert_eq!(
            parse_numeric_list("10, 20, 30"),
            Some(vec![10.0, 20.0, 30.0])
        );
        assert_eq!(parse_numeric_list("10, twenty"), None);
    }

    #[test]
    fn test_display_record_numeric() {
        let record = DisplayValueRecord {
            kind: "number".into(),
            text: None,
            number: Some(42.0),
            display_value: None,
        };
        assert_eq!(display_record(&def("number"), &record), Scalar::Number(42.0));

        let record = DisplayValueRecord {
            kind: "number".into(),
            text: Some("n/a".into()),
            number: None,
            display_value: None,
        };
        assert_eq!(display_record(&def("number"), &record), Scalar::Empty);
    }

    #[test]
    fn test_display_record_text() {
        let record = DisplayValueRecord {
            kind: "text".into(),
            text: Some("hello".into()),
            number: None,
            display_value: None,
        };
        assert_eq!(display_record(&def("text"), &record), Scalar::text("hello"));

        let record = DisplayValueRecord::default();
        assert_eq!(display_record(&def("text"), &record), Scalar::Empty);
    }

    #[test]
    fn test_mirror_function_metadata() {
        assert_eq!(MirrorFunction::Sum.numeric_default(), Some(0.0));
        assert_eq!(MirrorFunction::Max.numeric_default(), None);
    }
}
