//! Tag update step shared by taggable resource types

use crate::aws::api::RemoteCall;
use crate::aws::request::LambdaRequest;
use crate::error::ProviderError;
use crate::save::{SaveContext, SaveOperation};
use crate::spec::changes::ResourceChanges;
use crate::spec::path::FieldPath;
use crate::spec::tags::{diff_tags, tags_from_spec, Tag, TagDiff};
use async_trait::async_trait;
use serde_json::{json, Value};

pub const TAGS_PATH: &str = "$.tags";

/// Tags recorded in the current spec, used to order fetched tags.
/// A malformed list only loses the ordering hint.
pub fn known_tags(spec: &Value) -> Value {
    match tags_from_spec(spec, TAGS_PATH) {
        Ok(tags) => tags
            .iter()
            .map(|t| json!({"key": t.key, "value": t.value}))
            .collect(),
        Err(e) => {
            tracing::warn!("Ignoring known tags: {}", e);
            json!([])
        },
    }
}

/// Tag and untag the resource so its tags match the desired spec
pub struct UpdateTags<D> {
    previous: Vec<Tag>,
    resource_arn: fn(&SaveContext<D>) -> Option<String>,
    arn: Option<String>,
    diff: TagDiff,
}

impl<D> UpdateTags<D> {
    pub fn new(previous: Vec<Tag>, resource_arn: fn(&SaveContext<D>) -> Option<String>) -> Self {
        Self {
            previous,
            resource_arn,
            arn: None,
            diff: TagDiff::default(),
        }
    }
}

#[async_trait]
impl<D: Send + Sync> SaveOperation<D> for UpdateTags<D> {
    fn name(&self) -> &'static str {
        "UpdateTags"
    }

    fn prepare(
        &mut self,
        context: &SaveContext<D>,
        spec: &Value,
        changes: Option<&ResourceChanges>,
    ) -> Result<bool, ProviderError> {
        if let Some(changes) = changes {
            if !changes.has_changed(&FieldPath::parse(TAGS_PATH)?) {
                return Ok(false);
            }
        }

        let desired = tags_from_spec(spec, TAGS_PATH)?;
        self.diff = diff_tags(&desired, &self.previous);
        if !self.diff.has_updates() {
            return Ok(false);
        }

        self.arn = (self.resource_arn)(context);
        if self.arn.is_none() {
            return Err(ProviderError::invariant("resource ARN unknown when updating tags"));
        }
        Ok(true)
    }

    async fn execute(
        &mut self,
        _context: &mut SaveContext<D>,
        remote: &RemoteCall<'_>,
    ) -> Result<(), ProviderError> {
        let Some(arn) = self.arn.clone() else {
            return Err(ProviderError::invariant("UpdateTags executed before prepare"));
        };

        if !self.diff.add.is_empty() {
            remote
                .send(LambdaRequest::TagResource {
                    resource_arn: arn.clone(),
                    tags: std::mem::take(&mut self.diff.add),
                })
                .await?;
        }
        if !self.diff.remove.is_empty() {
            remote
                .send(LambdaRequest::UntagResource {
                    resource_arn: arn,
                    tag_keys: std::mem::take(&mut self.diff.remove),
                })
                .await?;
        }
        Ok(())
    }
}
