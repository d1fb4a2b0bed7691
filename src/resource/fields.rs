//! Spec and response field helpers shared by the resource types

use crate::error::ProviderError;
use crate::spec::changes::ResourceChanges;
use crate::spec::path::FieldPath;
use serde_json::Value;
use std::collections::BTreeMap;

fn lookup<'a>(tree: &'a Value, path: &str) -> Result<Option<&'a Value>, ProviderError> {
    Ok(FieldPath::parse(path)?.get(tree))
}

/// Non-empty string at `path`, or a missing-field error
pub fn required_str(
    spec: &Value,
    path: &str,
    resource_type: &'static str,
) -> Result<String, ProviderError> {
    optional_str(spec, path)?.ok_or_else(|| ProviderError::missing_field(resource_type, path))
}

pub fn optional_str(spec: &Value, path: &str) -> Result<Option<String>, ProviderError> {
    match lookup(spec, path)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ProviderError::invalid_value(path, "expected a string")),
    }
}

pub fn optional_i64(spec: &Value, path: &str) -> Result<Option<i64>, ProviderError> {
    match lookup(spec, path)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .map(Some)
            .ok_or_else(|| ProviderError::invalid_value(path, "expected an integer")),
    }
}

/// String member of a remote response the caller can not proceed without
pub fn response_str(
    response: &Value,
    key: &str,
    operation: &'static str,
) -> Result<String, ProviderError> {
    response
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| ProviderError::unexpected_response(operation, format!("missing {}", key)))
}

/// Collect the values of `paths` present in `state`
pub fn computed_fields(state: &Value, paths: &[String]) -> BTreeMap<String, Value> {
    paths
        .iter()
        .filter_map(|path| {
            let value = FieldPath::parse(path).ok()?.get(state)?;
            Some((path.clone(), value.clone()))
        })
        .collect()
}

/// What to do with a sub-configuration managed by its own API call
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigChange {
    Put(Value),
    Clear,
}

/// Decide whether the sub-configuration at `path` must be written or cleared.
///
/// Without a change list (a create) any present value is written.
pub fn config_change(
    spec: &Value,
    path: &str,
    changes: Option<&ResourceChanges>,
) -> Result<Option<ConfigChange>, ProviderError> {
    let field = FieldPath::parse(path)?;
    match (field.get(spec).filter(|v| !v.is_null()), changes) {
        (Some(value), None) => Ok(Some(ConfigChange::Put(value.clone()))),
        (Some(value), Some(changes)) if changes.has_changed(&field) => {
            Ok(Some(ConfigChange::Put(value.clone())))
        },
        (None, Some(changes)) if changes.was_removed(&field) => Ok(Some(ConfigChange::Clear)),
        _ => Ok(None),
    }
}

/// ARN segment at `index` (`arn:aws:lambda:region:account:kind:name:qualifier`)
pub fn arn_segment(arn: &str, index: usize) -> Option<&str> {
    if !arn.starts_with("arn:") {
        return None;
    }
    arn.split(':').nth(index).filter(|s| !s.is_empty())
}

/// Function name from a function, version or alias ARN
pub fn function_name_from_arn(arn: &str) -> Option<&str> {
    if arn_segment(arn, 5) != Some("function") {
        return None;
    }
    arn_segment(arn, 6)
}

/// True when both references (short names or ARNs) name the same function
pub fn same_function(a: &str, b: &str) -> bool {
    let a = function_name_from_arn(a).unwrap_or(a);
    let b = function_name_from_arn(b).unwrap_or(b);
    a == b
}

/// Prefer the previously known function reference when it names the
/// function the API reported, so a short name is not replaced by an ARN
pub fn keep_function_reference(reported: &str, known: Option<&Value>) -> Value {
    match known.and_then(|v| v.as_str()) {
        Some(known) if same_function(known, reported) => Value::String(known.to_string()),
        _ => Value::String(reported.to_string()),
    }
}
