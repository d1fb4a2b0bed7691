//! Resource abstraction layer
//!
//! Each Lambda construct implements the four lifecycle calls a host
//! orchestrator makes: fetch the external state, deploy (create or update),
//! destroy, and a point-in-time stabilisation check. [`Provider`] selects the
//! implementation from the resource type string.
//!
//! # Architecture
//!
//! - [`registry`] - Closed set of resource types and their embedded metadata
//! - [`function`], [`alias`], [`layer_version`], [`event_source_mapping`] -
//!   per-type save pipelines, reconcilers and checks
//! - [`fields`] - Spec/response helpers shared by the types
//! - [`tagging`] - Tag update step shared by taggable types
//!
//! # Example
//!
//! ```ignore
//! use lambda_provider::resource::{FetchInput, Provider};
//! use tokio_util::sync::CancellationToken;
//!
//! async fn lookup(provider: &Provider) -> anyhow::Result<serde_json::Value> {
//!     let input = FetchInput { current_spec: serde_json::json!({"functionName": "orders"}) };
//!     Ok(provider
//!         .fetch_external_state("aws/lambda/function", &input, &CancellationToken::new())
//!         .await?)
//! }
//! ```

pub mod alias;
pub mod event_source_mapping;
pub mod fields;
pub mod function;
pub mod layer_version;
mod registry;
pub mod tagging;

pub use registry::*;

use crate::aws::api::{LambdaApi, RemoteCall};
use crate::aws::request::LambdaRequest;
use crate::error::ProviderError;
use crate::save::{SaveContext, SaveFailure, SaveOutcome};
use crate::spec::changes::ResourceChanges;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchInput {
    pub current_spec: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployInput {
    #[serde(default)]
    pub instance_id: Option<String>,
    pub desired_spec: Value,
    /// Previously applied state; absent for a create
    #[serde(default)]
    pub previous_spec: Option<Value>,
    #[serde(default)]
    pub changes: Option<ResourceChanges>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployOutput {
    /// Durable remote identifier, set when this call created the resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_id: Option<String>,
    /// Computed field values keyed by spec path
    pub computed_fields: BTreeMap<String, Value>,
    /// True when at least one remote write was made
    pub applied: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestroyInput {
    pub previous_spec: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StabilisedInput {
    pub current_spec: Value,
}

/// Lifecycle entry points for every supported resource type
#[derive(Clone)]
pub struct Provider {
    api: Arc<dyn LambdaApi>,
}

impl Provider {
    pub fn new(api: Arc<dyn LambdaApi>) -> Self {
        Self { api }
    }

    /// Supported resource type names
    pub fn resource_types() -> Vec<&'static str> {
        ResourceKind::all().iter().map(|k| k.as_str()).collect()
    }

    fn remote<'a>(&'a self, cancel: &'a CancellationToken) -> RemoteCall<'a> {
        RemoteCall::new(self.api.as_ref(), cancel)
    }

    /// Canonical spec of what exists remotely; `{}` when it does not exist
    pub async fn fetch_external_state(
        &self,
        resource_type: &str,
        input: &FetchInput,
        cancel: &CancellationToken,
    ) -> Result<Value, ProviderError> {
        let kind: ResourceKind = resource_type.parse()?;
        let remote = self.remote(cancel);
        tracing::info!("Fetching external state of {}", kind);

        match kind {
            ResourceKind::Function => function::fetch(&remote, input).await,
            ResourceKind::Alias => alias::fetch(&remote, input).await,
            ResourceKind::LayerVersion => layer_version::fetch(&remote, input).await,
            ResourceKind::EventSourceMapping => event_source_mapping::fetch(&remote, input).await,
        }
    }

    /// Create (no previous spec) or update the resource
    pub async fn deploy(
        &self,
        resource_type: &str,
        input: &DeployInput,
        cancel: &CancellationToken,
    ) -> Result<DeployOutput, ProviderError> {
        let kind: ResourceKind = resource_type.parse()?;
        let remote = self.remote(cancel);

        // An update with no change list has nothing to apply
        let unchanged;
        let input = if input.previous_spec.is_some() && input.changes.is_none() {
            tracing::warn!("Update of {} without a change list; treating as unchanged", kind);
            unchanged = DeployInput {
                changes: Some(ResourceChanges::default()),
                ..input.clone()
            };
            &unchanged
        } else {
            input
        };

        tracing::info!(
            "Deploying {} ({})",
            kind,
            if input.previous_spec.is_some() { "update" } else { "create" }
        );

        let output = match kind {
            ResourceKind::Function => function::deploy(&remote, input).await,
            ResourceKind::Alias => alias::deploy(&remote, input).await,
            ResourceKind::LayerVersion => layer_version::deploy(&remote, input).await,
            ResourceKind::EventSourceMapping => event_source_mapping::deploy(&remote, input).await,
        };

        if let Err(e) = &output {
            tracing::error!("Deploy of {} failed ({}): {}", kind, e.category(), e);
        }
        output
    }

    pub async fn destroy(
        &self,
        resource_type: &str,
        input: &DestroyInput,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError> {
        let kind: ResourceKind = resource_type.parse()?;
        let remote = self.remote(cancel);
        tracing::info!("Destroying {}", kind);

        match kind {
            ResourceKind::Function => function::destroy(&remote, input).await,
            ResourceKind::Alias => alias::destroy(&remote, input).await,
            ResourceKind::LayerVersion => layer_version::destroy(&remote, input).await,
            ResourceKind::EventSourceMapping => event_source_mapping::destroy(&remote, input).await,
        }
    }

    /// Single point-in-time readiness check; never polls
    pub async fn stabilised(
        &self,
        resource_type: &str,
        input: &StabilisedInput,
        cancel: &CancellationToken,
    ) -> Result<bool, ProviderError> {
        let kind: ResourceKind = resource_type.parse()?;
        let remote = self.remote(cancel);
        tracing::debug!("Checking stabilisation of {}", kind);

        match kind {
            ResourceKind::Function => function::stabilised(&remote, input).await,
            ResourceKind::Alias => alias::stabilised(&remote, input).await,
            ResourceKind::LayerVersion => layer_version::stabilised(&remote, input).await,
            ResourceKind::EventSourceMapping => {
                event_source_mapping::stabilised(&remote, input).await
            },
        }
    }
}

/// Turn a pipeline result into the deploy output.
///
/// `computed` renders the fields the pipeline learned; paths it leaves out
/// keep their previously known values. A run that applied nothing reports
/// the previous computed fields unchanged.
pub(crate) fn finish_deploy<D>(
    kind: ResourceKind,
    input: &DeployInput,
    result: Result<SaveOutcome<D>, SaveFailure<D>>,
    computed: impl Fn(&SaveContext<D>) -> Value,
) -> Result<DeployOutput, ProviderError> {
    let def = kind.definition()?;
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(failure) => {
            let resource = match &input.instance_id {
                Some(id) => format!("{} {}", kind, id),
                None => kind.to_string(),
            };
            return Err(failure.into_error(resource));
        },
    };

    let mut computed_fields = input
        .previous_spec
        .as_ref()
        .map(|previous| fields::computed_fields(previous, &def.computed_fields))
        .unwrap_or_default();

    if outcome.applied {
        tracing::info!("Applied {} steps: {}", kind, outcome.completed.join(", "));
        computed_fields.extend(fields::computed_fields(
            &computed(&outcome.context),
            &def.computed_fields,
        ));
    } else {
        tracing::info!("No changes to apply for {}", kind);
    }

    Ok(DeployOutput {
        upstream_id: outcome.context.upstream_id().map(|s| s.to_string()),
        computed_fields,
        applied: outcome.applied,
    })
}

/// Issue a delete; a resource that is already gone counts as destroyed
pub(crate) async fn delete_resource(
    remote: &RemoteCall<'_>,
    request: LambdaRequest,
) -> Result<(), ProviderError> {
    let operation = request.operation();
    match remote.send(request).await {
        Ok(_) => Ok(()),
        Err(e) if e.is_not_found() => {
            tracing::warn!("{}: resource already absent", operation);
            Ok(())
        },
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deploy_input_from_host_document() {
        let input: DeployInput = serde_json::from_value(json!({
            "desiredSpec": {"functionName": "orders"},
            "previousSpec": {"functionName": "orders", "arn": "arn:x"},
            "changes": {"modifiedFields": [{"fieldPath": "$.timeout", "newValue": 30}]}
        }))
        .unwrap();
        assert!(input.instance_id.is_none());
        assert_eq!(input.changes.unwrap().modified_fields[0].field_path, "$.timeout");
    }

    #[test]
    fn test_deploy_output_omits_missing_upstream_id() {
        let output = DeployOutput::default();
        let value = serde_json::to_value(&output).unwrap();
        assert_eq!(value, json!({"computedFields": {}, "applied": false}));
    }

    #[test]
    fn test_resource_types_listed() {
        let types = Provider::resource_types();
        assert_eq!(types.len(), 4);
        assert!(types.contains(&"aws/lambda/eventSourceMapping"));
    }
}
