//! External-state reconciliation
//!
//! Builds the spec tree describing what actually exists remotely. Fields the
//! API never returns (code archives, upload locations) are carried over from
//! the previously known spec so they do not show up as drift.

use crate::error::ProviderError;
use crate::spec::extract::{run_extractors, OptionalValueExtractor};
use crate::spec::path::FieldPath;
use serde_json::{Map, Value};

type Required<R> = Box<dyn Fn(&R) -> Result<Value, ProviderError> + Send + Sync>;

pub struct StateReconciler<R> {
    required: Required<R>,
    extractors: Vec<OptionalValueExtractor<R>>,
    input_only_fields: &'static [&'static str],
}

impl<R> StateReconciler<R> {
    /// `required` builds the tree holding the always-present fields; it
    /// fails when the response lacks one of them.
    pub fn new(
        required: impl Fn(&R) -> Result<Value, ProviderError> + Send + Sync + 'static,
        extractors: Vec<OptionalValueExtractor<R>>,
        input_only_fields: &'static [&'static str],
    ) -> Self {
        Self {
            required: Box::new(required),
            extractors,
            input_only_fields,
        }
    }

    pub fn input_only_fields(&self) -> &'static [&'static str] {
        self.input_only_fields
    }

    /// Build the current tree from a fetched response.
    ///
    /// Input-only fields are copied from `previous` only where the built tree
    /// lacks them; a value from the response always wins.
    pub fn reconcile(&self, response: &R, previous: Option<&Value>) -> Result<Value, ProviderError> {
        let mut state = (self.required)(response)?;
        if !state.is_object() {
            return Err(ProviderError::invariant(
                "required field builder must produce a map",
            ));
        }

        run_extractors(response, &self.extractors, &mut state)?;

        if let Some(previous) = previous {
            for field in self.input_only_fields {
                let path = FieldPath::parse(field)?;
                if path.has(&state) {
                    continue;
                }
                if let Some(value) = path.get(previous) {
                    tracing::trace!("Carrying input-only field {}", field);
                    path.set(&mut state, value.clone());
                }
            }
        }

        Ok(state)
    }
}

/// Tree reported for a resource that does not exist remotely
pub fn empty_state() -> Value {
    Value::Object(Map::new())
}
