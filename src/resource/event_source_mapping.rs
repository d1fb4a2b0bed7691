//! Lambda event source mapping (`aws/lambda/eventSourceMapping`)

use super::fields::{keep_function_reference, optional_str, required_str, response_str};
use super::tagging::{known_tags, UpdateTags, TAGS_PATH};
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
use crate::spec::shape::spec_shape;
use crate::spec::tags::{tags_from_spec, tags_to_api, tags_to_spec};
use async_trait::async_trait;
use serde_json::{json, Value};

pub const RESOURCE_TYPE: &str = "aws/lambda/eventSourceMapping";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingSaveData {
    pub uuid: Option<String>,
    pub arn: Option<String>,
}

type Context = SaveContext<MappingSaveData>;

/// Setters accepted by both create and update
fn mapping_setters() -> Vec<ValueSetter<RequestBody>> {
    vec![
        ValueSetter::field("$.functionName", "FunctionName"),
        ValueSetter::field("$.batchSize", "BatchSize"),
        ValueSetter::field("$.enabled", "Enabled"),
        ValueSetter::field("$.maximumBatchingWindowInSeconds", "MaximumBatchingWindowInSeconds"),
        ValueSetter::field("$.maximumRetryAttempts", "MaximumRetryAttempts"),
        ValueSetter::field("$.maximumRecordAgeInSeconds", "MaximumRecordAgeInSeconds"),
        ValueSetter::field("$.bisectBatchOnFunctionError", "BisectBatchOnFunctionError"),
        ValueSetter::field("$.parallelizationFactor", "ParallelizationFactor"),
        ValueSetter::field("$.tumblingWindowInSeconds", "TumblingWindowInSeconds"),
        ValueSetter::field("$.functionResponseTypes", "FunctionResponseTypes"),
        ValueSetter::shaped("$.filterCriteria", "FilterCriteria"),
        ValueSetter::shaped("$.destinationConfig", "DestinationConfig"),
        ValueSetter::shaped("$.scalingConfig", "ScalingConfig"),
        ValueSetter::field("$.kmsKeyArn", "KMSKeyArn"),
    ]
}

struct CreateEventSourceMapping {
    body: RequestBody,
}

#[async_trait]
impl SaveOperation<MappingSaveData> for CreateEventSourceMapping {
    fn name(&self) -> &'static str {
        "CreateEventSourceMapping"
    }

    fn prepare(
        &mut self,
        _context: &Context,
        spec: &Value,
        _changes: Option<&ResourceChanges>,
    ) -> Result<bool, ProviderError> {
        required_str(spec, "$.functionName", RESOURCE_TYPE)?;

        let mut setters = mapping_setters();
        setters.extend([
            ValueSetter::field("$.eventSourceArn", "EventSourceArn"),
            ValueSetter::field("$.startingPosition", "StartingPosition"),
            ValueSetter::field("$.startingPositionTimestamp", "StartingPositionTimestamp"),
        ]);
        self.body = RequestBody::new();
        ValueSetterSet::new(setters).apply(spec, None, &mut self.body)?;

        let tags = tags_from_spec(spec, TAGS_PATH)?;
        if !tags.is_empty() {
            self.body.insert("Tags".to_string(), tags_to_api(&tags));
        }
        Ok(true)
    }

    async fn execute(&mut self, context: &mut Context, remote: &RemoteCall<'_>) -> Result<(), ProviderError> {
        let response = remote
            .send(LambdaRequest::CreateEventSourceMapping {
                body: Value::Object(std::mem::take(&mut self.body)),
            })
            .await?;

        let uuid = response_str(&response, "UUID", "CreateEventSourceMapping")?;
        let arn = response_str(&response, "EventSourceMappingArn", "CreateEventSourceMapping")?;
        tracing::info!("Created event source mapping {}", uuid);

        context.data.uuid = Some(uuid);
        context.data.arn = Some(arn.clone());
        context.set_upstream_id(arn);
        Ok(())
    }
}

struct UpdateEventSourceMapping {
    body: RequestBody,
}

#[async_trait]
impl SaveOperation<MappingSaveData> for UpdateEventSourceMapping {
    fn name(&self) -> &'static str {
        "UpdateEventSourceMapping"
    }

    fn prepare(
        &mut self,
        _context: &Context,
        spec: &Value,
        changes: Option<&ResourceChanges>,
    ) -> Result<bool, ProviderError> {
        let setters: ValueSetterSet<RequestBody> =
            mapping_setters().into_iter().map(ValueSetter::when_changed).collect();
        self.body = RequestBody::new();
        let mut has_updates = setters.apply(spec, changes, &mut self.body)?;

        if let Some(changes) = changes {
            let cleared = [
                ("$.filterCriteria", "FilterCriteria", json!({"Filters": []})),
                ("$.destinationConfig", "DestinationConfig", json!({"OnFailure": {}})),
                ("$.functionResponseTypes", "FunctionResponseTypes", json!([])),
                ("$.kmsKeyArn", "KMSKeyArn", json!("")),
            ];
            for (path, key, value) in cleared {
                let field = FieldPath::parse(path)?;
                if changes.was_removed(&field) && !field.has(spec) {
                    self.body.insert(key.to_string(), value);
                    has_updates = true;
                }
            }
        }
        Ok(has_updates)
    }

    async fn execute(&mut self, context: &mut Context, remote: &RemoteCall<'_>) -> Result<(), ProviderError> {
        let uuid = context
            .data
            .uuid
            .clone()
            .ok_or_else(|| ProviderError::invariant("mapping UUID missing from save context"))?;
        remote
            .send(LambdaRequest::UpdateEventSourceMapping {
                uuid,
                body: Value::Object(std::mem::take(&mut self.body)),
            })
            .await?;
        Ok(())
    }
}

fn mapping_arn(context: &Context) -> Option<String> {
    context.data.arn.clone()
}

pub async fn deploy(remote: &RemoteCall<'_>, input: &DeployInput) -> Result<DeployOutput, ProviderError> {
    let (context, operations) = match &input.previous_spec {
        None => {
            let operations: Vec<BoxedOperation<MappingSaveData>> =
                vec![Box::new(CreateEventSourceMapping { body: RequestBody::new() })];
            (SaveContext::new(MappingSaveData::default()), operations)
        },
        Some(previous) => {
            let data = MappingSaveData {
                uuid: Some(required_str(previous, "$.id", RESOURCE_TYPE)?),
                arn: optional_str(previous, "$.eventSourceMappingArn")?,
            };
            let operations: Vec<BoxedOperation<MappingSaveData>> = vec![
                Box::new(UpdateEventSourceMapping { body: RequestBody::new() }),
                Box::new(UpdateTags::new(tags_from_spec(previous, TAGS_PATH)?, mapping_arn)),
            ];
            (SaveContext::new(data), operations)
        },
    };

    let result = run_save_operations(
        context,
        operations,
        &input.desired_spec,
        input.changes.as_ref(),
        remote,
    )
    .await;

    finish_deploy(ResourceKind::EventSourceMapping, input, result, |context| {
        let mut state = json!({});
        if let Some(uuid) = &context.data.uuid {
            state["id"] = json!(uuid);
        }
        if let Some(arn) = &context.data.arn {
            state["eventSourceMappingArn"] = json!(arn);
        }
        state
    })
}

/// `Enabled` is reported through the mapping state
fn enabled_from_state(state: &Value) -> Option<Value> {
    match state.as_str()? {
        "Enabled" | "Enabling" | "Creating" => Some(Value::Bool(true)),
        "Disabled" | "Disabling" => Some(Value::Bool(false)),
        _ => None,
    }
}

fn copy(name: &'static str, source: &'static str, field: &'static str) -> OptionalValueExtractor<Value> {
    OptionalValueExtractor::copy(name, source, field)
}

fn reconciler() -> StateReconciler<Value> {
    StateReconciler::new(
        |response: &Value| {
            let mapping = &response["mapping"];
            let member = |key: &str| {
                mapping[key].as_str().ok_or_else(|| {
                    ProviderError::unexpected_response("GetEventSourceMapping", format!("missing {}", key))
                })
            };
            Ok(json!({
                "id": member("UUID")?,
                "eventSourceMappingArn": member("EventSourceMappingArn")?,
                "functionName": keep_function_reference(member("FunctionArn")?, response.get("knownFunctionName")),
            }))
        },
        vec![
            copy("eventSourceArn", "$.mapping.EventSourceArn", "$.eventSourceArn"),
            copy("batchSize", "$.mapping.BatchSize", "$.batchSize"),
            OptionalValueExtractor::map("enabled", "$.mapping.State", "$.enabled", enabled_from_state),
            copy("startingPosition", "$.mapping.StartingPosition", "$.startingPosition"),
            copy(
                "startingPositionTimestamp",
                "$.mapping.StartingPositionTimestamp",
                "$.startingPositionTimestamp",
            ),
            copy(
                "maximumBatchingWindowInSeconds",
                "$.mapping.MaximumBatchingWindowInSeconds",
                "$.maximumBatchingWindowInSeconds",
            ),
            copy(
                "maximumRetryAttempts",
                "$.mapping.MaximumRetryAttempts",
                "$.maximumRetryAttempts",
            ),
            copy(
                "maximumRecordAgeInSeconds",
                "$.mapping.MaximumRecordAgeInSeconds",
                "$.maximumRecordAgeInSeconds",
            ),
            copy(
                "bisectBatchOnFunctionError",
                "$.mapping.BisectBatchOnFunctionError",
                "$.bisectBatchOnFunctionError",
            ),
            copy(
                "parallelizationFactor",
                "$.mapping.ParallelizationFactor",
                "$.parallelizationFactor",
            ),
            copy(
                "tumblingWindowInSeconds",
                "$.mapping.TumblingWindowInSeconds",
                "$.tumblingWindowInSeconds",
            ),
            copy(
                "functionResponseTypes",
                "$.mapping.FunctionResponseTypes",
                "$.functionResponseTypes",
            ),
            OptionalValueExtractor::map(
                "filterCriteria",
                "$.mapping.FilterCriteria.Filters",
                "$.filterCriteria",
                |filters| Some(json!({ "filters": spec_shape(filters) })),
            ),
            OptionalValueExtractor::map(
                "destinationConfig",
                "$.mapping.DestinationConfig.OnFailure.Destination",
                "$.destinationConfig",
                |destination| Some(json!({ "onFailure": { "destination": destination } })),
            ),
            OptionalValueExtractor::map(
                "scalingConfig",
                "$.mapping.ScalingConfig",
                "$.scalingConfig",
                |config| Some(spec_shape(config)),
            ),
            copy("kmsKeyArn", "$.mapping.KMSKeyArn", "$.kmsKeyArn"),
            OptionalValueExtractor::new(
                "tags",
                vec![TAGS_PATH],
                |r: &Value| r["tags"].as_object().is_some_and(|t| !t.is_empty()),
                |r: &Value| {
                    let known = tags_from_spec(r, "$.knownTags")?;
                    let remote = r["tags"].as_object().cloned().unwrap_or_default();
                    Ok(vec![Some(tags_to_spec(&remote, &known))])
                },
            ),
        ],
        &[],
    )
}

pub async fn fetch(remote: &RemoteCall<'_>, input: &FetchInput) -> Result<Value, ProviderError> {
    let spec = &input.current_spec;
    let uuid = required_str(spec, "$.id", RESOURCE_TYPE)?;

    let Some(mapping) = remote
        .send_optional(LambdaRequest::GetEventSourceMapping { uuid: uuid.clone() })
        .await?
    else {
        tracing::info!("Event source mapping {} does not exist", uuid);
        return Ok(empty_state());
    };

    let tags = match mapping["EventSourceMappingArn"].as_str() {
        Some(arn) => remote
            .send_optional(LambdaRequest::ListTags { resource_arn: arn.to_string() })
            .await?
            .and_then(|r| r.get("Tags").cloned()),
        None => None,
    };

    let response = json!({
        "mapping": mapping,
        "tags": tags,
        "knownTags": known_tags(spec),
        "knownFunctionName": spec.get("functionName"),
    });
    reconciler().reconcile(&response, Some(spec))
}

pub async fn destroy(remote: &RemoteCall<'_>, input: &DestroyInput) -> Result<(), ProviderError> {
    let uuid = required_str(&input.previous_spec, "$.id", RESOURCE_TYPE)?;
    delete_resource(remote, LambdaRequest::DeleteEventSourceMapping { uuid }).await
}

/// Settled once the mapping is Enabled or Disabled
pub async fn stabilised(remote: &RemoteCall<'_>, input: &StabilisedInput) -> Result<bool, ProviderError> {
    let uuid = required_str(&input.current_spec, "$.id", RESOURCE_TYPE)?;
    let mapping = remote
        .send(LambdaRequest::GetEventSourceMapping { uuid: uuid.clone() })
        .await?;

    let state = mapping["State"].as_str().unwrap_or_default();
    tracing::debug!("Event source mapping {} state={}", uuid, state);
    Ok(matches!(state, "Enabled" | "Disabled"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::changes::FieldChange;

    const FUNCTION_ARN: &str = "arn:aws:lambda:us-east-1:123456789012:function:orders";

    #[test]
    fn test_reconcile_mapping() {
        let response = json!({
            "mapping": {
                "UUID": "a1b2c3",
                "EventSourceMappingArn": "arn:aws:lambda:us-east-1:123456789012:event-source-mapping:a1b2c3",
                "FunctionArn": FUNCTION_ARN,
                "EventSourceArn": "arn:aws:sqs:us-east-1:123456789012:orders",
                "BatchSize": 10,
                "State": "Disabled",
                "FunctionResponseTypes": [],
                "FilterCriteria": {"Filters": [{"Pattern": "{\"body\": [\"x\"]}"}]}
            },
            "tags": {"team": "payments"},
            "knownTags": [],
            "knownFunctionName": "orders",
        });
        let state = reconciler().reconcile(&response, None).unwrap();
        assert_eq!(
            state,
            json!({
                "id": "a1b2c3",
                "eventSourceMappingArn": "arn:aws:lambda:us-east-1:123456789012:event-source-mapping:a1b2c3",
                "functionName": "orders",
                "eventSourceArn": "arn:aws:sqs:us-east-1:123456789012:orders",
                "batchSize": 10,
                "enabled": false,
                "filterCriteria": {"filters": [{"pattern": "{\"body\": [\"x\"]}"}]},
                "tags": [{"key": "team", "value": "payments"}]
            })
        );
    }

    #[test]
    fn test_update_sends_changed_fields_only() {
        let mut step = UpdateEventSourceMapping { body: RequestBody::new() };
        let context = SaveContext::new(MappingSaveData::default());
        let changes = ResourceChanges {
            modified_fields: vec![FieldChange::new("$.batchSize")],
            removed_fields: vec!["$.filterCriteria".to_string()],
            ..Default::default()
        };
        let spec = json!({"functionName": "orders", "batchSize": 50, "enabled": true});
        assert!(step.prepare(&context, &spec, Some(&changes)).unwrap());
        assert_eq!(
            Value::Object(step.body.clone()),
            json!({"BatchSize": 50, "FilterCriteria": {"Filters": []}})
        );
    }

    #[test]
    fn test_enabled_from_state() {
        assert_eq!(enabled_from_state(&json!("Enabling")), Some(json!(true)));
        assert_eq!(enabled_from_state(&json!("Disabled")), Some(json!(false)));
        assert_eq!(enabled_from_state(&json!("Deleting")), None);
    }
}
