//! Property-based tests using proptest
//!
//! These tests exercise the spec tree engine with randomized inputs: field
//! path addressing, tree writes and tag deltas.

use lambda_provider::spec::changes::{FieldChange, ResourceChanges};
use lambda_provider::spec::path::FieldPath;
use lambda_provider::spec::tags::{diff_tags, Tag};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Map keys, including ones that need bracket quoting
fn arb_segment() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z][a-zA-Z0-9_]{0,11}",
        "[a-z]{1,5}\\.[a-z]{1,5}",
        "[a-z]{1,4}\\[[a-z]{1,4}",
    ]
}

fn arb_path() -> impl Strategy<Value = FieldPath> {
    prop::collection::vec(arb_segment(), 1..5).prop_map(|segments| {
        segments
            .iter()
            .fold(FieldPath::root(), |path, segment| path.child(segment))
    })
}

fn arb_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        "[ -~]{0,20}".prop_map(Value::from),
    ]
}

fn arb_tags() -> impl Strategy<Value = Vec<Tag>> {
    prop::collection::vec(("[a-e]{1,2}", "[a-z0-9]{0,6}"), 0..12).prop_map(|pairs| {
        pairs
            .into_iter()
            .map(|(key, value)| Tag::new(&key, &value))
            .collect()
    })
}

proptest! {
    /// Rendering a path and parsing it back addresses the same node
    #[test]
    fn test_path_display_parses_back(path in arb_path()) {
        let rendered = path.to_string();
        let parsed = FieldPath::parse(&rendered).expect("rendered path should parse");
        prop_assert_eq!(parsed, path);
    }

    /// A value written at a path is read back unchanged
    #[test]
    fn test_set_then_get(path in arb_path(), leaf in arb_leaf()) {
        let mut tree = json!({});
        path.set(&mut tree, leaf.clone());
        prop_assert_eq!(path.get(&tree), Some(&leaf));
        prop_assert!(path.has(&tree));
    }

    /// Writing one path never disturbs a sibling written earlier
    #[test]
    fn test_set_keeps_siblings(
        parent in arb_path(),
        a in arb_segment(),
        b in arb_segment(),
        first in arb_leaf(),
        second in arb_leaf(),
    ) {
        prop_assume!(a != b);
        let mut tree = json!({});
        parent.child(&a).set(&mut tree, first.clone());
        parent.child(&b).set(&mut tree, second.clone());
        prop_assert_eq!(parent.child(&a).get(&tree), Some(&first));
        prop_assert_eq!(parent.child(&b).get(&tree), Some(&second));
    }

    /// Changing a node reports every ancestor and descendant as changed
    #[test]
    fn test_has_changed_covers_ancestors(path in arb_path(), extra in arb_segment()) {
        let changes = ResourceChanges {
            modified_fields: vec![FieldChange::new(&path.to_string())],
            ..Default::default()
        };
        prop_assert!(changes.has_changed(&path));
        prop_assert!(changes.has_changed(&path.child(&extra)));
        prop_assert!(changes.has_changed(&FieldPath::root()));
        prop_assert!(!changes.was_removed(&path));
    }

    /// Applying the delta to the previous tags yields exactly the desired tags
    #[test]
    fn test_tag_diff_is_complete(desired in arb_tags(), previous in arb_tags()) {
        let diff = diff_tags(&desired, &previous);

        let mut applied: BTreeMap<String, String> = previous
            .iter()
            .map(|t| (t.key.clone(), t.value.clone()))
            .collect();
        for key in &diff.remove {
            applied.remove(key);
        }
        applied.extend(diff.add.clone());

        let expected: BTreeMap<String, String> = desired
            .iter()
            .map(|t| (t.key.clone(), t.value.clone()))
            .collect();
        prop_assert_eq!(applied, expected);
    }

    /// Removed keys never overlap the keys being (re)applied
    #[test]
    fn test_tag_diff_disjoint(desired in arb_tags(), previous in arb_tags()) {
        let diff = diff_tags(&desired, &previous);
        for key in &diff.remove {
            prop_assert!(!diff.add.contains_key(key));
        }
    }

    /// Diffing a tag list against itself removes nothing
    #[test]
    fn test_tag_diff_against_self(tags in arb_tags()) {
        let diff = diff_tags(&tags, &tags);
        prop_assert!(diff.remove.is_empty());
        prop_assert_eq!(diff.has_updates(), !tags.is_empty());
    }
}
