/// Field-level comparison of two event snapshots
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Which keys a diff considers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffMode {
    /// Only keys present in the first snapshot. Keys that exist only in the
    /// second snapshot are not reported.
    #[default]
    Asymmetric,
    /// Union of the keys of both snapshots
    Symmetric,
}

/// Old and new value of one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub from: Value,
    pub to: Value,
}

/// Changed fields keyed by field name
pub type EventDiff = BTreeMap<String, FieldChange>;

/// Compare two snapshots, omitting equal fields
///
/// A key missing from one side compares as `null`.
pub fn diff_snapshots(first: &Map<String, Value>, second: &Map<String, Value>, mode: DiffMode) -> EventDiff {
    let keys: BTreeSet<&String> = match mode {
        DiffMode::Asymmetric => first.keys().collect(),
        DiffMode::Symmetric => first.keys().chain(second.keys()).collect(),
    };

    keys.into_iter()
        .filter_map(|key| {
            let from = first.get(key).cloned().unwrap_or(Value::Null);
            let to = second.get(key).cloned().unwrap_or(Value::Null);
            (from != to).then(|| (key.clone(), FieldChange { from, to }))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_diff_with_itself_is_empty() {
        let v = snapshot(json!({"title": "Standup", "location": null}));
        assert!(diff_snapshots(&v, &v, DiffMode::Asymmetric).is_empty());
        assert!(diff_snapshots(&v, &v, DiffMode::Symmetric).is_empty());
    }

    #[test]
    fn test_only_changed_fields_reported() {
        let v1 = snapshot(json!({"title": "Standup", "description": "daily"}));
        let v2 = snapshot(json!({"title": "Standup v2", "description": "daily"}));

        let diff = diff_snapshots(&v1, &v2, DiffMode::Asymmetric);
        assert_eq!(diff.len(), 1);
        assert_eq!(
            diff["title"],
            FieldChange {
                from: json!("Standup"),
                to: json!("Standup v2"),
            }
        );
    }

    #[test]
    fn test_asymmetric_ignores_keys_only_in_second() {
        let v1 = snapshot(json!({"title": "a"}));
        let v2 = snapshot(json!({"title": "a", "location": "Room 1"}));

        assert!(diff_snapshots(&v1, &v2, DiffMode::Asymmetric).is_empty());

        let symmetric = diff_snapshots(&v1, &v2, DiffMode::Symmetric);
        assert_eq!(
            symmetric["location"],
            FieldChange {
                from: Value::Null,
                to: json!("Room 1"),
            }
        );
    }

    #[test]
    fn test_key_missing_from_second_compares_as_null() {
        let v1 = snapshot(json!({"title": "a", "location": "Room 1"}));
        let v2 = snapshot(json!({"title": "a"}));

        let diff = diff_snapshots(&v1, &v2, DiffMode::Asymmetric);
        assert_eq!(diff["location"].to, Value::Null);
    }

    #[test]
    fn test_mode_parses_lowercase() {
        let mode: DiffMode = serde_json::from_str("\"symmetric\"").unwrap();
        assert_eq!(mode, DiffMode::Symmetric);
        assert_eq!(DiffMode::default(), DiffMode::Asymmetric);
    }
}
