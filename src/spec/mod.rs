//! Specification tree engine
//!
//! The specification tree is a [`serde_json::Value`]. This module provides
//! the pieces every resource type builds on:
//!
//! - [`path`] - `$.segment` field paths: parse, get, has, set
//! - [`changes`] - host-supplied field changes for an update
//! - [`extract`] - remote response -> tree field extractors
//! - [`setter`] - tree -> request value setters with change gating
//! - [`tags`] - tag lists and add/remove deltas
//! - [`shape`] - camelCase/PascalCase member conversion

pub mod changes;
pub mod extract;
pub mod path;
pub mod setter;
pub mod shape;
pub mod tags;

pub use changes::{ChangeKind, FieldChange, ResourceChanges};
pub use extract::{run_extractors, OptionalValueExtractor};
pub use path::{get_value, set_value, FieldPath, PathError};
pub use setter::{RequestBody, ValueSetter, ValueSetterSet};
pub use tags::{diff_tags, tags_from_spec, tags_to_api, tags_to_spec, Tag, TagDiff};
