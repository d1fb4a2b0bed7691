//! Field paths over the specification tree
//!
//! Paths use the `$.segment.segment` syntax. A key containing a dot or a
//! bracket can be written in quoted form: `$["app.config"].enabled`.
//! Segments address map keys only.

use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path must start with '$': {0}")]
    MissingRoot(String),

    #[error("empty segment at offset {offset} in {path}")]
    EmptySegment { path: String, offset: usize },

    #[error("list indexing is not supported: {0}")]
    IndexNotSupported(String),

    #[error("unterminated bracket segment in {0}")]
    Unterminated(String),

    #[error("unexpected character '{found}' at offset {offset} in {path}")]
    Unexpected {
        path: String,
        offset: usize,
        found: char,
    },
}

/// A parsed field path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// The root path `$`
    pub fn root() -> Self {
        Self::default()
    }

    pub fn parse(input: &str) -> Result<Self, PathError> {
        let rest = input
            .strip_prefix('$')
            .ok_or_else(|| PathError::MissingRoot(input.to_string()))?;
        let chars: Vec<char> = rest.chars().collect();
        let mut segments = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '.' => {
                    let start = i + 1;
                    let mut end = start;
                    while end < chars.len() && chars[end] != '.' && chars[end] != '[' {
                        end += 1;
                    }
                    if end == start {
                        return Err(PathError::EmptySegment {
                            path: input.to_string(),
                            offset: start + 1,
                        });
                    }
                    segments.push(chars[start..end].iter().collect());
                    i = end;
                },
                '[' => match chars.get(i + 1) {
                    Some('"') => {
                        let start = i + 2;
                        let mut end = start;
                        while end < chars.len() && chars[end] != '"' {
                            end += 1;
                        }
                        if end + 1 >= chars.len() || chars[end + 1] != ']' {
                            return Err(PathError::Unterminated(input.to_string()));
                        }
                        if end == start {
                            return Err(PathError::EmptySegment {
                                path: input.to_string(),
                                offset: start + 1,
                            });
                        }
                        segments.push(chars[start..end].iter().collect());
                        i = end + 2;
                    },
                    Some(c) if c.is_ascii_digit() => {
                        return Err(PathError::IndexNotSupported(input.to_string()));
                    },
                    Some(&c) => {
                        return Err(PathError::Unexpected {
                            path: input.to_string(),
                            offset: i + 2,
                            found: c,
                        });
                    },
                    None => return Err(PathError::Unterminated(input.to_string())),
                },
                c => {
                    return Err(PathError::Unexpected {
                        path: input.to_string(),
                        offset: i + 1,
                        found: c,
                    });
                },
            }
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Path extended by one map key
    pub fn child(&self, key: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(key.to_string());
        Self { segments }
    }

    /// True when `prefix` addresses this path or one of its ancestors
    pub fn starts_with(&self, prefix: &FieldPath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Look up the node at this path; missing or non-map intermediates give `None`
    pub fn get<'a>(&self, tree: &'a Value) -> Option<&'a Value> {
        let mut current = tree;
        for segment in &self.segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Presence check, independent of the stored value
    pub fn has(&self, tree: &Value) -> bool {
        self.get(tree).is_some()
    }

    /// Write `value` at this path in a tree under construction.
    ///
    /// Missing intermediates are created as maps; a non-map intermediate is
    /// replaced by a map.
    pub fn set(&self, tree: &mut Value, value: Value) {
        let Some((last, parents)) = self.segments.split_last() else {
            *tree = value;
            return;
        };

        let mut current = tree;
        for segment in parents {
            current = ensure_object(current)
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        ensure_object(current).insert(last.clone(), value);
    }
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was replaced with an object above"),
    }
}

fn needs_quoting(segment: &str) -> bool {
    segment.contains(['.', '[', ']', '"'])
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for segment in &self.segments {
            if needs_quoting(segment) {
                write!(f, "[\"{}\"]", segment)?;
            } else {
                write!(f, ".{}", segment)?;
            }
        }
        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Parse `path` and look it up in `tree`
pub fn get_value<'a>(path: &str, tree: &'a Value) -> Result<Option<&'a Value>, PathError> {
    Ok(FieldPath::parse(path)?.get(tree))
}

/// Parse `path` and write `value` into `tree`
pub fn set_value(path: &str, tree: &mut Value, value: Value) -> Result<(), PathError> {
    FieldPath::parse(path)?.set(tree, value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_dotted_segments() {
        let path = FieldPath::parse("$.vpcConfig.subnetIds").unwrap();
        assert_eq!(path.segments(), &["vpcConfig", "subnetIds"]);
        assert!(FieldPath::parse("$").unwrap().is_root());
    }

    #[test]
    fn test_parse_quoted_segment() {
        let path = FieldPath::parse("$.environment[\"app.mode\"].value").unwrap();
        assert_eq!(path.segments(), &["environment", "app.mode", "value"]);
        assert_eq!(path.to_string(), "$.environment[\"app.mode\"].value");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(
            FieldPath::parse("code.s3Key"),
            Err(PathError::MissingRoot(_))
        ));
        assert!(matches!(
            FieldPath::parse("$.layers[0]"),
            Err(PathError::IndexNotSupported(_))
        ));
        assert!(matches!(
            FieldPath::parse("$.a..b"),
            Err(PathError::EmptySegment { offset: 4, .. })
        ));
        assert!(matches!(
            FieldPath::parse("$[\"open"),
            Err(PathError::Unterminated(_))
        ));
        assert!(matches!(
            FieldPath::parse("$x"),
            Err(PathError::Unexpected { found: 'x', .. })
        ));
    }

    #[test]
    fn test_get_missing_intermediate_is_not_found() {
        let tree = json!({"code": {"s3Bucket": "artifacts"}, "timeout": 30});
        assert_eq!(
            get_value("$.code.s3Bucket", &tree).unwrap(),
            Some(&json!("artifacts"))
        );
        assert_eq!(get_value("$.vpcConfig.subnetIds", &tree).unwrap(), None);
        assert_eq!(get_value("$.timeout.value", &tree).unwrap(), None);
    }

    #[test]
    fn test_has_distinguishes_presence_from_value() {
        let tree = json!({"description": ""});
        let path = FieldPath::parse("$.description").unwrap();
        assert!(path.has(&tree));
        assert!(!FieldPath::parse("$.handler").unwrap().has(&tree));
    }

    #[test]
    fn test_set_creates_intermediate_maps() {
        let mut tree = json!({});
        set_value("$.tracingConfig.mode", &mut tree, json!("Active")).unwrap();
        set_value("$.timeout", &mut tree, json!(10)).unwrap();
        assert_eq!(tree, json!({"tracingConfig": {"mode": "Active"}, "timeout": 10}));
    }

    #[test]
    fn test_set_root_replaces_tree() {
        let mut tree = json!({"old": true});
        FieldPath::root().set(&mut tree, json!({"new": true}));
        assert_eq!(tree, json!({"new": true}));
    }

    #[test]
    fn test_starts_with_and_child() {
        let code = FieldPath::parse("$.code").unwrap();
        let key = code.child("s3Key");
        assert!(key.starts_with(&code));
        assert!(!code.starts_with(&key));
        assert!(key.starts_with(&FieldPath::root()));
    }
}
