//! Strategy selection
//!
//! Pure functions over schema metadata that decide which fetches are worth
//! issuing. The platform's cached `display_value` is empty for columns
//! whose kind is formula, mirror or lookup, so probes against those are
//! suppressed. Strategy only ever skips fetches whose results the resolver
//! would have discarded; the full schema lookup stays authoritative.

use boardcalc_core::{ColumnId, ColumnSettings};

use crate::schema::BoardSchema;

/// Column-id prefixes the platform assigns to complex kinds. Used only when
/// the target board's schema has not been loaded yet.
const COMPLEX_ID_PREFIXES: &[&str] = &["formula", "mirror", "lookup"];

/// Heuristic: does this column id look like a complex column?
pub fn looks_complex(column_id: &str) -> bool {
    COMPLEX_ID_PREFIXES
        .iter()
        .any(|prefix| column_id.starts_with(prefix))
}

/// Classify a dependency as complex (needs recursion) or simple (the
/// coordinator's deep query answers it). Falls back to the id-prefix
/// heuristic for columns missing from the schema.
fn is_complex(column_id: &str, schema: &BoardSchema) -> bool {
    match schema.column(column_id) {
        Some(def) => def.kind.is_complex(),
        None => looks_complex(column_id),
    }
}

/// Whether a mirror's deep fetch is worth preceding with a display-value
/// probe: only when the first target column is itself a simple kind.
pub fn mirror_fast_path_usable(
    settings: &ColumnSettings,
    target_schema: Option<&BoardSchema>,
) -> bool {
    let target = match settings.displayed_linked_columns.first() {
        Some(t) => t,
        None => return false,
    };
    let target_column = match target.column_ids.first() {
        Some(c) => c,
        None => return false,
    };

    match target_schema {
        Some(schema) => !is_complex(target_column, schema),
        None => !looks_complex(target_column),
    }
}

/// Fetch plan for a formula's dependencies.
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaPlan {
    /// Probe the formula column's own cached display value first. Set when
    /// at least one dependency is simple.
    pub probe_display_value: bool,
    /// Dependencies served through the coordinator's batched deep query.
    pub batched: Vec<ColumnId>,
    /// Dependencies requiring recursive resolution.
    pub recursive: Vec<ColumnId>,
}

/// Plan the dependency fetches for a formula on a board whose schema is
/// loaded. Pure: inspects schema metadata only, never runtime values.
pub fn plan_formula<'a, I>(deps: I, schema: &BoardSchema) -> FormulaPlan
where
    I: IntoIterator<Item = &'a ColumnId>,
{
    let mut batched = Vec::new();
    let mut recursive = Vec::new();

    for dep in deps {
        if is_complex(dep, schema) {
            recursive.push(dep.clone());
        } else {
            batched.push(dep.clone());
        }
    }

    FormulaPlan {
        probe_display_value: !batched.is_empty(),
        batched,
        recursive,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RawColumnDef;
    use serde_json::json;

    fn schema() -> BoardSchema {
        BoardSchema::from_raw(vec![
            RawColumnDef {
                id: "numbers1".into(),
                title: "Numbers".into(),
                kind: "number".into(),
                settings: None,
            },
            RawColumnDef {
                id: "status1".into(),
                title: "Status".into(),
                kind: "status".into(),
                settings: None,
            },
            RawColumnDef {
                id: "formula1".into(),
                title: "Formula".into(),
                kind: "formula".into(),
                settings: Some(json!({ "formula": "{numbers1}" })),
            },
            RawColumnDef {
                id: "mirror1".into(),
                title: "Mirror".into(),
                kind: "mirror".into(),
                settings: None,
            },
        ])
    }

    fn ids(ids: &[&str]) -> Vec<ColumnId> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_all_simple_deps() {
        let deps = ids(&["numbers1", "status1"]);
        let plan = plan_formula(deps.iter(), &schema());
        assert!(plan.probe_display_value);
        assert_eq!(plan.batched, deps);
        assert!(plan.recursive.is_empty());
    }

    #[test]
    fn test_all_complex_deps_skip_probe_and_coordinator() {
        let deps = ids(&["formula1", "mirror1"]);
        let plan = plan_formula(deps.iter(), &schema());
        assert!(!plan.probe_display_value);
        assert!(plan.batched.is_empty());
        assert_eq!(plan.recursive, deps);
    }

    #[test]
    fn test_mixed_deps_split() {
        let deps = ids(&["numbers1", "mirror1"]);
        let plan = plan_formula(deps.iter(), &schema());
        assert!(plan.probe_display_value);
        assert_eq!(plan.batched, ids(&["numbers1"]));
        assert_eq!(plan.recursive, ids(&["mirror1"]));
    }

    #[test]
    fn test_unknown_dep_uses_prefix_heuristic() {
        let deps = ids(&["lookup_xyz", "text_xyz"]);
        let plan = plan_formula(deps.iter(), &schema());
        assert_eq!(plan.batched, ids(&["text_xyz"]));
        assert_eq!(plan.recursive, ids(&["lookup_xyz"]));
    }

    #[test]
    fn test_mirror_fast_path() {
        let simple: ColumnSettings = serde_json::from_value(json!({
            "displayed_linked_columns": [{ "board_id": 456, "column_ids": ["numbers1"] }]
        }))
        .unwrap();
        let complex: ColumnSettings = serde_json::from_value(json!({
            "displayed_linked_columns": [{ "board_id": 456, "column_ids": ["formula1"] }]
        }))
        .unwrap();

        // Schema available: authoritative kinds
        assert!(mirror_fast_path_usable(&simple, Some(&schema())));
        assert!(!mirror_fast_path_usable(&complex, Some(&schema())));

        // No schema yet: id-prefix heuristic
        assert!(mirror_fast_path_usable(&simple, None));
        assert!(!mirror_fast_path_usable(&complex, None));

        // No target at all: nothing to probe
        assert!(!mirror_fast_path_usable(&ColumnSettings::default(), None));
    }
}
