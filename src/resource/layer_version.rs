//! Lambda layer version (`aws/lambda/layerVersion`)
//!
//! Published layer versions are immutable. Any change to a deployed version
//! is a replacement, which the host performs as destroy plus create; an
//! update here applies nothing.

use super::fields::{arn_segment, optional_i64, optional_str, required_str, response_str};
use super::{
    delete_resource, finish_deploy, DeployInput, DeployOutput, DestroyInput, FetchInput,
    ResourceKind, StabilisedInput,
};
use crate::aws::api::RemoteCall;
use crate::aws::request::LambdaRequest;
use crate::error::ProviderError;
use crate::reconcile::{empty_state, StateReconciler};
use crate::save::{run_save_operations, BoxedOperation, SaveContext, SaveOperation};
use crate::spec::changes::ResourceChanges;
use crate::spec::extract::OptionalValueExtractor;
use crate::spec::path::FieldPath;
use crate::spec::setter::{RequestBody, ValueSetter, ValueSetterSet};
use async_trait::async_trait;
use serde_json::{json, Value};

pub const RESOURCE_TYPE: &str = "aws/lambda/layerVersion";

pub const INPUT_ONLY_FIELDS: &[&str] = &[
    "$.content.s3Bucket",
    "$.content.s3Key",
    "$.content.s3ObjectVersion",
    "$.content.zipFile",
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerSaveData {
    pub layer_arn: Option<String>,
    pub layer_version_arn: Option<String>,
    pub version: Option<i64>,
}

type Context = SaveContext<LayerSaveData>;

struct PublishLayerVersion {
    layer_name: String,
    body: RequestBody,
}

#[async_trait]
impl SaveOperation<LayerSaveData> for PublishLayerVersion {
    fn name(&self) -> &'static str {
        "PublishLayerVersion"
    }

    fn prepare(
        &mut self,
        _context: &Context,
        spec: &Value,
        _changes: Option<&ResourceChanges>,
    ) -> Result<bool, ProviderError> {
        self.layer_name = required_str(spec, "$.layerName", RESOURCE_TYPE)?;
        if !FieldPath::parse("$.content")?.has(spec) {
            return Err(ProviderError::missing_field(RESOURCE_TYPE, "$.content"));
        }

        let setters = ValueSetterSet::new(vec![
            ValueSetter::shaped("$.content", "Content"),
            ValueSetter::field("$.description", "Description"),
            ValueSetter::field("$.compatibleRuntimes", "CompatibleRuntimes"),
            ValueSetter::field("$.compatibleArchitectures", "CompatibleArchitectures"),
            ValueSetter::field("$.licenseInfo", "LicenseInfo"),
        ]);
        self.body = RequestBody::new();
        setters.apply(spec, None, &mut self.body)?;
        Ok(true)
    }

    async fn execute(&mut self, context: &mut Context, remote: &RemoteCall<'_>) -> Result<(), ProviderError> {
        let response = remote
            .send(LambdaRequest::PublishLayerVersion {
                layer_name: self.layer_name.clone(),
                body: Value::Object(std::mem::take(&mut self.body)),
            })
            .await?;

        let version_arn = response_str(&response, "LayerVersionArn", "PublishLayerVersion")?;
        tracing::info!("Published layer version {}", version_arn);

        context.data.layer_arn = Some(response_str(&response, "LayerArn", "PublishLayerVersion")?);
        context.data.version = response.get("Version").and_then(|v| v.as_i64());
        context.data.layer_version_arn = Some(version_arn.clone());
        context.set_upstream_id(version_arn);
        Ok(())
    }
}

pub async fn deploy(remote: &RemoteCall<'_>, input: &DeployInput) -> Result<DeployOutput, ProviderError> {
    let operations: Vec<BoxedOperation<LayerSaveData>> = match &input.previous_spec {
        None => vec![Box::new(PublishLayerVersion {
            layer_name: String::new(),
            body: RequestBody::new(),
        })],
        Some(_) => {
            if input.changes.as_ref().is_some_and(|c| !c.is_empty()) {
                tracing::warn!("Layer versions are immutable; changes require replacement");
            }
            Vec::new()
        },
    };

    let result = run_save_operations(
        SaveContext::new(LayerSaveData::default()),
        operations,
        &input.desired_spec,
        input.changes.as_ref(),
        remote,
    )
    .await;

    finish_deploy(ResourceKind::LayerVersion, input, result, |context| {
        let mut state = json!({});
        if let Some(arn) = &context.data.layer_arn {
            state["layerArn"] = json!(arn);
        }
        if let Some(arn) = &context.data.layer_version_arn {
            state["layerVersionArn"] = json!(arn);
        }
        if let Some(version) = context.data.version {
            state["version"] = json!(version);
        }
        state
    })
}

/// Layer name and version number: from the version ARN once known, else the spec
fn lookup_key(spec: &Value) -> Result<(String, i64), ProviderError> {
    if let Some(arn) = optional_str(spec, "$.layerVersionArn")? {
        let name = arn_segment(&arn, 6);
        let version = arn_segment(&arn, 7).and_then(|v| v.parse().ok());
        if let (Some(name), Some(version)) = (name, version) {
            return Ok((name.to_string(), version));
        }
        tracing::warn!("Ignoring malformed layer version ARN {}", arn);
    }

    let name = required_str(spec, "$.layerName", RESOURCE_TYPE)?;
    let version = optional_i64(spec, "$.version")?
        .ok_or_else(|| ProviderError::missing_field(RESOURCE_TYPE, "$.version"))?;
    Ok((name, version))
}

fn reconciler() -> StateReconciler<Value> {
    StateReconciler::new(
        |layer: &Value| {
            let member = |key: &str| {
                layer[key].as_str().ok_or_else(|| {
                    ProviderError::unexpected_response("GetLayerVersion", format!("missing {}", key))
                })
            };
            let layer_arn = member("LayerArn")?;
            let name = arn_segment(layer_arn, 6).ok_or_else(|| {
                ProviderError::unexpected_response("GetLayerVersion", format!("malformed layer ARN {}", layer_arn))
            })?;
            let version = layer["Version"].as_i64().ok_or_else(|| {
                ProviderError::unexpected_response("GetLayerVersion", "missing Version")
            })?;
            Ok(json!({
                "layerName": name,
                "layerArn": layer_arn,
                "layerVersionArn": member("LayerVersionArn")?,
                "version": version,
            }))
        },
        vec![
            OptionalValueExtractor::copy("description", "$.Description", "$.description"),
            OptionalValueExtractor::copy(
                "compatibleRuntimes",
                "$.CompatibleRuntimes",
                "$.compatibleRuntimes",
            ),
            OptionalValueExtractor::copy(
                "compatibleArchitectures",
                "$.CompatibleArchitectures",
                "$.compatibleArchitectures",
            ),
            OptionalValueExtractor::copy("licenseInfo", "$.LicenseInfo", "$.licenseInfo"),
        ],
        INPUT_ONLY_FIELDS,
    )
}

pub async fn fetch(remote: &RemoteCall<'_>, input: &FetchInput) -> Result<Value, ProviderError> {
    let spec = &input.current_spec;
    let (layer_name, version_number) = lookup_key(spec)?;

    match remote
        .send_optional(LambdaRequest::GetLayerVersion {
            layer_name: layer_name.clone(),
            version_number,
        })
        .await?
    {
        Some(layer) => reconciler().reconcile(&layer, Some(spec)),
        None => {
            tracing::info!("Layer version {}:{} does not exist", layer_name, version_number);
            Ok(empty_state())
        },
    }
}

pub async fn destroy(remote: &RemoteCall<'_>, input: &DestroyInput) -> Result<(), ProviderError> {
    let (layer_name, version_number) = lookup_key(&input.previous_spec)?;
    delete_resource(
        remote,
        LambdaRequest::DeleteLayerVersion {
            layer_name,
            version_number,
        },
    )
    .await
}

/// Publishing is synchronous; a published version is immediately usable
pub async fn stabilised(_remote: &RemoteCall<'_>, _input: &StabilisedInput) -> Result<bool, ProviderError> {
    Ok(true)
}
