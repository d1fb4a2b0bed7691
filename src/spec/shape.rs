//! Key-case conversion between spec fields (camelCase) and Lambda API
//! members (PascalCase).
//!
//! Only structural keys are converted. Maps whose keys are user data
//! (environment variables, tags, routing weights) must be copied as-is by
//! the caller instead.

use serde_json::{Map, Value};

/// `subnetIds` -> `SubnetIds`, recursively
pub fn api_shape(value: &Value) -> Value {
    convert_keys(value, upper_first)
}

/// `SubnetIds` -> `subnetIds`, recursively
pub fn spec_shape(value: &Value) -> Value {
    convert_keys(value, lower_first)
}

/// Keep only the listed keys of a map, dropping null members
pub fn pick(value: &Value, keys: &[&str]) -> Option<Value> {
    let map = value.as_object()?;
    let picked: Map<String, Value> = keys
        .iter()
        .filter_map(|k| {
            map.get(*k)
                .filter(|v| !v.is_null())
                .map(|v| (k.to_string(), v.clone()))
        })
        .collect();
    if picked.is_empty() {
        None
    } else {
        Some(Value::Object(picked))
    }
}

/// Null, empty strings, lists and maps count as "not configured"
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

fn convert_keys(value: &Value, convert: fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (convert(k), convert_keys(v, convert)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|v| convert_keys(v, convert)).collect()),
        other => other.clone(),
    }
}

fn upper_first(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn lower_first(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_api_shape_is_recursive() {
        let spec = json!({
            "onFailure": {"destination": "arn:aws:sqs:us-east-1:123456789012:dlq"},
            "filters": [{"pattern": "{}"}]
        });
        assert_eq!(
            api_shape(&spec),
            json!({
                "OnFailure": {"Destination": "arn:aws:sqs:us-east-1:123456789012:dlq"},
                "Filters": [{"Pattern": "{}"}]
            })
        );
    }

    #[test]
    fn test_spec_shape_inverts_api_shape() {
        let api = json!({"SubnetIds": ["subnet-1"], "Ipv6AllowedForDualStack": false});
        assert_eq!(
            spec_shape(&api),
            json!({"subnetIds": ["subnet-1"], "ipv6AllowedForDualStack": false})
        );
    }

    #[test]
    fn test_pick_drops_unlisted_and_null() {
        let api = json!({"SubnetIds": ["subnet-1"], "VpcId": "vpc-1", "SecurityGroupIds": null});
        assert_eq!(
            pick(&api, &["SubnetIds", "SecurityGroupIds"]),
            Some(json!({"SubnetIds": ["subnet-1"]}))
        );
        assert_eq!(pick(&api, &["Missing"]), None);
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(&json!("")));
        assert!(is_blank(&json!([])));
        assert!(!is_blank(&json!(0)));
        assert!(!is_blank(&json!(false)));
    }
}
