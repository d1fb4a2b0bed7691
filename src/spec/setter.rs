//! Value setters
//!
//! The inverse of extraction: populate an outbound request from the spec
//! tree. A setter fires when its source path is present. Setters meant for
//! update requests opt into a change gate with [`ValueSetter::when_changed`]
//! so fields that merely have a value do not force an update call.

use super::changes::ResourceChanges;
use super::path::FieldPath;
use super::shape::api_shape;
use crate::error::ProviderError;
use serde_json::{Map, Value};

/// Request body under construction
pub type RequestBody = Map<String, Value>;

type Consumer<T> = Box<dyn Fn(&Value, &mut T) + Send + Sync>;

pub struct ValueSetter<T> {
    path: &'static str,
    apply: Consumer<T>,
    check_changes: bool,
}

impl<T> ValueSetter<T> {
    pub fn new(path: &'static str, apply: impl Fn(&Value, &mut T) + Send + Sync + 'static) -> Self {
        Self {
            path,
            apply: Box::new(apply),
            check_changes: false,
        }
    }

    /// Only fire when the host reports a change at (or around) this path
    pub fn when_changed(mut self) -> Self {
        self.check_changes = true;
        self
    }

    pub fn path(&self) -> &'static str {
        self.path
    }

    /// Apply this setter; returns whether it set a value.
    ///
    /// With no change list (a create) the change gate does not apply.
    pub fn set(
        &self,
        spec: &Value,
        changes: Option<&ResourceChanges>,
        target: &mut T,
    ) -> Result<bool, ProviderError> {
        let path = FieldPath::parse(self.path)?;
        let Some(value) = path.get(spec) else {
            return Ok(false);
        };

        if self.check_changes {
            if let Some(changes) = changes {
                if !changes.has_changed(&path) {
                    return Ok(false);
                }
            }
        }

        (self.apply)(value, target);
        Ok(true)
    }
}

impl ValueSetter<RequestBody> {
    /// Copy the spec value verbatim into `key`
    pub fn field(path: &'static str, key: &'static str) -> Self {
        Self::new(path, move |value, body: &mut RequestBody| {
            body.insert(key.to_string(), value.clone());
        })
    }

    /// Copy a structured spec value into `key`, converting member names to API case
    pub fn shaped(path: &'static str, key: &'static str) -> Self {
        Self::new(path, move |value, body: &mut RequestBody| {
            body.insert(key.to_string(), api_shape(value));
        })
    }
}

/// An ordered group of setters populating one request
pub struct ValueSetterSet<T> {
    setters: Vec<ValueSetter<T>>,
}

impl<T> ValueSetterSet<T> {
    pub fn new(setters: Vec<ValueSetter<T>>) -> Self {
        Self { setters }
    }

    /// Apply every setter; returns true when at least one fired
    pub fn apply(
        &self,
        spec: &Value,
        changes: Option<&ResourceChanges>,
        target: &mut T,
    ) -> Result<bool, ProviderError> {
        let mut has_updates = false;
        for setter in &self.setters {
            if setter.set(spec, changes, target)? {
                tracing::trace!("Setter {} fired", setter.path());
                has_updates = true;
            }
        }
        Ok(has_updates)
    }

    pub fn len(&self) -> usize {
        self.setters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.setters.is_empty()
    }
}

impl<T> FromIterator<ValueSetter<T>> for ValueSetterSet<T> {
    fn from_iter<I: IntoIterator<Item = ValueSetter<T>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
