//! Optional value extractors
//!
//! Converts a fetched remote response into spec tree fields. Each extractor
//! is gated by a condition on the response and may populate several related
//! fields at once; `None` entries in its output are skipped so a
//! multi-field extractor can leave absent members out.

use super::path::FieldPath;
use super::shape::is_blank;
use crate::error::ProviderError;
use serde_json::Value;

type Condition<R> = Box<dyn Fn(&R) -> bool + Send + Sync>;
type Producer<R> = Box<dyn Fn(&R) -> Result<Vec<Option<Value>>, ProviderError> + Send + Sync>;

pub struct OptionalValueExtractor<R> {
    pub name: &'static str,
    pub fields: Vec<&'static str>,
    condition: Condition<R>,
    values: Producer<R>,
}

impl<R> OptionalValueExtractor<R> {
    pub fn new(
        name: &'static str,
        fields: Vec<&'static str>,
        condition: impl Fn(&R) -> bool + Send + Sync + 'static,
        values: impl Fn(&R) -> Result<Vec<Option<Value>>, ProviderError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            fields,
            condition: Box::new(condition),
            values: Box::new(values),
        }
    }

    pub fn applies_to(&self, input: &R) -> bool {
        (self.condition)(input)
    }
}

impl OptionalValueExtractor<Value> {
    /// Copy the non-blank value at `source` in the response to `field`
    pub fn copy(name: &'static str, source: &'static str, field: &'static str) -> Self {
        Self::map(name, source, field, |v| Some(v.clone()))
    }

    /// Like [`copy`](Self::copy) but passes the value through `transform`;
    /// a `None` result leaves the field unset
    pub fn map(
        name: &'static str,
        source: &'static str,
        field: &'static str,
        transform: fn(&Value) -> Option<Value>,
    ) -> Self {
        Self::new(
            name,
            vec![field],
            move |response: &Value| lookup(source, response).is_some_and(|v| !is_blank(v)),
            move |response: &Value| {
                Ok(vec![lookup(source, response).and_then(transform)])
            },
        )
    }
}

fn lookup<'a>(source: &str, response: &'a Value) -> Option<&'a Value> {
    match FieldPath::parse(source) {
        Ok(path) => path.get(response),
        Err(e) => {
            tracing::error!("Invalid extractor source path {}: {}", source, e);
            None
        },
    }
}

/// Apply extractors in declaration order, writing into `target`.
///
/// Later extractors overwrite fields written by earlier ones. The first
/// failing producer aborts the whole set.
pub fn run_extractors<R>(
    input: &R,
    extractors: &[OptionalValueExtractor<R>],
    target: &mut Value,
) -> Result<(), ProviderError> {
    for extractor in extractors {
        if !extractor.applies_to(input) {
            tracing::trace!("Extractor {} not applicable", extractor.name);
            continue;
        }

        let values = (extractor.values)(input)?;
        if values.len() != extractor.fields.len() {
            return Err(ProviderError::invariant(format!(
                "extractor {} produced {} values for {} fields",
                extractor.name,
                values.len(),
                extractor.fields.len()
            )));
        }

        for (field, value) in extractor.fields.iter().zip(values) {
            let Some(value) = value else {
                continue;
            };
            FieldPath::parse(field)?.set(target, value);
        }
    }
    Ok(())
}
