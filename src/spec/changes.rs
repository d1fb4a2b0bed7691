//! Field changes supplied by the host for an update deploy

use super::path::FieldPath;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One field's delta between the previously applied spec and the desired spec
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    pub field_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
}

impl FieldChange {
    pub fn new(field_path: &str) -> Self {
        Self {
            field_path: field_path.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    New,
    Modified,
    Removed,
}

/// The change set for one resource, read-only for the provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceChanges {
    #[serde(default)]
    pub new_fields: Vec<FieldChange>,
    #[serde(default)]
    pub modified_fields: Vec<FieldChange>,
    #[serde(default)]
    pub removed_fields: Vec<String>,
}

impl ResourceChanges {
    pub fn is_empty(&self) -> bool {
        self.new_fields.is_empty() && self.modified_fields.is_empty() && self.removed_fields.is_empty()
    }

    /// Every changed path with its kind, in new, modified, removed order
    pub fn changed_paths(&self) -> impl Iterator<Item = (ChangeKind, &str)> {
        self.new_fields
            .iter()
            .map(|c| (ChangeKind::New, c.field_path.as_str()))
            .chain(
                self.modified_fields
                    .iter()
                    .map(|c| (ChangeKind::Modified, c.field_path.as_str())),
            )
            .chain(
                self.removed_fields
                    .iter()
                    .map(|p| (ChangeKind::Removed, p.as_str())),
            )
    }

    /// True when `path`, something nested under it, or one of its ancestors changed
    pub fn has_changed(&self, path: &FieldPath) -> bool {
        self.parsed_paths()
            .any(|(_, changed)| changed.starts_with(path) || path.starts_with(&changed))
    }

    /// True when `path` itself or one of its ancestors was removed
    pub fn was_removed(&self, path: &FieldPath) -> bool {
        self.parsed_paths()
            .any(|(kind, changed)| kind == ChangeKind::Removed && path.starts_with(&changed))
    }

    fn parsed_paths(&self) -> impl Iterator<Item = (ChangeKind, FieldPath)> + '_ {
        self.changed_paths().filter_map(|(kind, raw)| match FieldPath::parse(raw) {
            Ok(path) => Some((kind, path)),
            Err(e) => {
                tracing::warn!("Ignoring change with invalid path {}: {}", raw, e);
                None
            },
        })
    }
}
