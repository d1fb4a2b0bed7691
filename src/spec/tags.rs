//! Tag sets and tag deltas
//!
//! Tags live in the spec tree as a list of `{key, value}` maps so upstream
//! ordering and duplicates survive a round trip.

use super::path::FieldPath;
use crate::error::ProviderError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

/// Minimal add/remove delta between two tag lists
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDiff {
    pub add: BTreeMap<String, String>,
    pub remove: Vec<String>,
}

impl TagDiff {
    pub fn has_updates(&self) -> bool {
        !self.add.is_empty() || !self.remove.is_empty()
    }
}

/// Compute the tags to (re)apply and the keys to drop.
///
/// Every desired tag is re-sent, unchanged ones included; the tagging API is
/// idempotent on unchanged keys. Duplicate desired keys resolve last-wins.
pub fn diff_tags(desired: &[Tag], previous: &[Tag]) -> TagDiff {
    let add: BTreeMap<String, String> = desired
        .iter()
        .map(|t| (t.key.clone(), t.value.clone()))
        .collect();

    let remove = previous
        .iter()
        .filter(|t| !add.contains_key(&t.key))
        .map(|t| t.key.clone())
        .collect();

    TagDiff { add, remove }
}

/// Read the tag list at `path` in a spec tree; absent means no tags
pub fn tags_from_spec(spec: &Value, path: &str) -> Result<Vec<Tag>, ProviderError> {
    let Some(node) = FieldPath::parse(path)?.get(spec) else {
        return Ok(Vec::new());
    };
    let Some(items) = node.as_array() else {
        return Err(ProviderError::invalid_value(path, "tags must be a list"));
    };

    items
        .iter()
        .map(|item| {
            let key = item.get("key").and_then(|v| v.as_str());
            let value = item.get("value").and_then(|v| v.as_str());
            match (key, value) {
                (Some(key), Some(value)) => Ok(Tag::new(key, value)),
                _ => Err(ProviderError::invalid_value(
                    path,
                    "each tag needs string key and value fields",
                )),
            }
        })
        .collect()
}

/// Request-shaped tag map, last-wins on duplicate keys
pub fn tags_to_api(tags: &[Tag]) -> Value {
    let map: Map<String, Value> = tags
        .iter()
        .map(|t| (t.key.clone(), Value::String(t.value.clone())))
        .collect();
    Value::Object(map)
}

/// Build the tree list from a remote tag map.
///
/// Keys keep the order they had in `known` (the previously known spec
/// list); keys the spec did not know about follow in sorted order.
pub fn tags_to_spec(remote: &Map<String, Value>, known: &[Tag]) -> Value {
    let mut seen = HashSet::new();
    let mut items = Vec::with_capacity(remote.len());

    for tag in known {
        if !seen.insert(tag.key.as_str()) {
            continue;
        }
        if let Some(value) = remote.get(&tag.key).and_then(|v| v.as_str()) {
            items.push(json!({"key": tag.key, "value": value}));
        }
    }

    let mut rest: Vec<(&String, &Value)> = remote
        .iter()
        .filter(|(k, _)| !seen.contains(k.as_str()))
        .collect();
    rest.sort_by(|a, b| a.0.cmp(b.0));
    for (key, value) in rest {
        if let Some(value) = value.as_str() {
            items.push(json!({"key": key, "value": value}));
        }
    }

    Value::Array(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diff_of_identical_sets() {
        let tags = vec![Tag::new("env", "prod"), Tag::new("team", "core")];
        let diff = diff_tags(&tags, &tags);
        assert_eq!(diff.add.len(), 2);
        assert_eq!(diff.add["env"], "prod");
        assert!(diff.remove.is_empty());
        assert!(diff.has_updates());
    }

    #[test]
    fn test_diff_removes_dropped_keys() {
        let desired = vec![Tag::new("A", "1")];
        let previous = vec![Tag::new("A", "1"), Tag::new("B", "2")];
        let diff = diff_tags(&desired, &previous);
        assert_eq!(diff.add, BTreeMap::from([("A".to_string(), "1".to_string())]));
        assert_eq!(diff.remove, vec!["B".to_string()]);
    }

    #[test]
    fn test_diff_duplicate_desired_keys_last_wins() {
        let desired = vec![Tag::new("A", "1"), Tag::new("A", "2")];
        let diff = diff_tags(&desired, &[]);
        assert_eq!(diff.add["A"], "2");
    }

    #[test]
    fn test_empty_diff_has_no_updates() {
        assert!(!diff_tags(&[], &[]).has_updates());
    }

    #[test]
    fn test_tags_from_spec() {
        let spec = json!({"tags": [{"key": "env", "value": "dev"}]});
        assert_eq!(
            tags_from_spec(&spec, "$.tags").unwrap(),
            vec![Tag::new("env", "dev")]
        );
        assert!(tags_from_spec(&json!({}), "$.tags").unwrap().is_empty());
        assert!(tags_from_spec(&json!({"tags": {"env": "dev"}}), "$.tags").is_err());
        assert!(tags_from_spec(&json!({"tags": [{"key": "env"}]}), "$.tags").is_err());
    }

    #[test]
    fn test_tags_to_spec_preserves_known_order() {
        let remote = json!({"a": "1", "z": "26", "m": "13"});
        let known = vec![Tag::new("z", "old"), Tag::new("gone", "x")];
        let tree = tags_to_spec(remote.as_object().unwrap(), &known);
        assert_eq!(
            tree,
            json!([
                {"key": "z", "value": "26"},
                {"key": "a", "value": "1"},
                {"key": "m", "value": "13"}
            ])
        );
    }

    #[test]
    fn test_tags_to_api() {
        let tags = vec![Tag::new("env", "dev"), Tag::new("env", "prod")];
        assert_eq!(tags_to_api(&tags), json!({"env": "prod"}));
    }
}
