//! Lambda alias (`aws/lambda/alias`)

use super::fields::{
    arn_segment, config_change, keep_function_reference, optional_str, required_str,
    response_str, ConfigChange,
};
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

pub const RESOURCE_TYPE: &str = "aws/lambda/alias";

/// Returned when an alias has no provisioned concurrency configured
const PROVISIONED_CONFIG_NOT_FOUND: &str = "ProvisionedConcurrencyConfigNotFoundException";

const PROVISIONED_PATH: &str = "$.provisionedConcurrencyConfig.provisionedConcurrentExecutions";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AliasSaveData {
    pub function_name: Option<String>,
    pub alias_name: Option<String>,
    pub alias_arn: Option<String>,
}

type Context = SaveContext<AliasSaveData>;

fn alias_setters() -> Vec<ValueSetter<RequestBody>> {
    vec![
        ValueSetter::field("$.functionVersion", "FunctionVersion"),
        ValueSetter::field("$.description", "Description"),
        // Weight keys are version numbers; copied without key conversion
        ValueSetter::new(
            "$.routingConfig.additionalVersionWeights",
            |weights, body: &mut RequestBody| {
                body.insert(
                    "RoutingConfig".to_string(),
                    json!({ "AdditionalVersionWeights": weights }),
                );
            },
        ),
    ]
}

fn names(context: &Context) -> Result<(String, String), ProviderError> {
    match (&context.data.function_name, &context.data.alias_name) {
        (Some(function), Some(alias)) => Ok((function.clone(), alias.clone())),
        _ => Err(ProviderError::invariant("alias names missing from save context")),
    }
}

struct CreateAlias {
    function_name: String,
    alias_name: String,
    body: RequestBody,
}

#[async_trait]
impl SaveOperation<AliasSaveData> for CreateAlias {
    fn name(&self) -> &'static str {
        "CreateAlias"
    }

    fn prepare(
        &mut self,
        _context: &Context,
        spec: &Value,
        _changes: Option<&ResourceChanges>,
    ) -> Result<bool, ProviderError> {
        self.function_name = required_str(spec, "$.functionName", RESOURCE_TYPE)?;
        self.alias_name = required_str(spec, "$.name", RESOURCE_TYPE)?;
        required_str(spec, "$.functionVersion", RESOURCE_TYPE)?;

        self.body = RequestBody::new();
        self.body.insert("Name".to_string(), Value::String(self.alias_name.clone()));
        ValueSetterSet::new(alias_setters()).apply(spec, None, &mut self.body)?;
        Ok(true)
    }

    async fn execute(&mut self, context: &mut Context, remote: &RemoteCall<'_>) -> Result<(), ProviderError> {
        let response = remote
            .send(LambdaRequest::CreateAlias {
                function_name: self.function_name.clone(),
                body: Value::Object(std::mem::take(&mut self.body)),
            })
            .await?;

        let arn = response_str(&response, "AliasArn", "CreateAlias")?;
        tracing::info!("Created alias {}", arn);

        context.data.function_name = Some(self.function_name.clone());
        context.data.alias_name = Some(self.alias_name.clone());
        context.data.alias_arn = Some(arn.clone());
        context.set_upstream_id(arn);
        Ok(())
    }
}

struct UpdateAlias {
    body: RequestBody,
}

#[async_trait]
impl SaveOperation<AliasSaveData> for UpdateAlias {
    fn name(&self) -> &'static str {
        "UpdateAlias"
    }

    fn prepare(
        &mut self,
        _context: &Context,
        spec: &Value,
        changes: Option<&ResourceChanges>,
    ) -> Result<bool, ProviderError> {
        let setters: ValueSetterSet<RequestBody> =
            alias_setters().into_iter().map(ValueSetter::when_changed).collect();
        self.body = RequestBody::new();
        let mut has_updates = setters.apply(spec, changes, &mut self.body)?;

        if let Some(changes) = changes {
            let cleared = [
                ("$.description", "Description", json!("")),
                (
                    "$.routingConfig",
                    "RoutingConfig",
                    json!({"AdditionalVersionWeights": {}}),
                ),
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
        let (function_name, alias_name) = names(context)?;
        let response = remote
            .send(LambdaRequest::UpdateAlias {
                function_name,
                alias_name,
                body: Value::Object(std::mem::take(&mut self.body)),
            })
            .await?;

        if context.data.alias_arn.is_none() {
            context.data.alias_arn = response.get("AliasArn").and_then(|v| v.as_str()).map(String::from);
        }
        Ok(())
    }
}

struct ProvisionedConcurrency {
    pending: Option<LambdaRequest>,
}

#[async_trait]
impl SaveOperation<AliasSaveData> for ProvisionedConcurrency {
    fn name(&self) -> &'static str {
        "ProvisionedConcurrencyConfig"
    }

    fn prepare(
        &mut self,
        context: &Context,
        spec: &Value,
        changes: Option<&ResourceChanges>,
    ) -> Result<bool, ProviderError> {
        let Some(change) = config_change(spec, PROVISIONED_PATH, changes)? else {
            return Ok(false);
        };
        let (function_name, qualifier) = names(context)?;

        self.pending = Some(match change {
            ConfigChange::Put(value) => LambdaRequest::PutProvisionedConcurrencyConfig {
                function_name,
                qualifier,
                provisioned_concurrent_executions: value
                    .as_i64()
                    .ok_or_else(|| ProviderError::invalid_value(PROVISIONED_PATH, "expected an integer"))?,
            },
            ConfigChange::Clear => LambdaRequest::DeleteProvisionedConcurrencyConfig {
                function_name,
                qualifier,
            },
        });
        Ok(true)
    }

    async fn execute(&mut self, _context: &mut Context, remote: &RemoteCall<'_>) -> Result<(), ProviderError> {
        let request = self
            .pending
            .take()
            .ok_or_else(|| ProviderError::invariant("ProvisionedConcurrencyConfig executed before prepare"))?;
        remote.send(request).await?;
        Ok(())
    }
}

/// Function and alias name: from the alias ARN once known, else the spec
fn lookup_names(spec: &Value) -> Result<(String, String), ProviderError> {
    if let Some(arn) = optional_str(spec, "$.aliasArn")? {
        if let (Some(function), Some(alias)) = (arn_segment(&arn, 6), arn_segment(&arn, 7)) {
            return Ok((function.to_string(), alias.to_string()));
        }
        tracing::warn!("Ignoring malformed alias ARN {}", arn);
    }
    Ok((
        required_str(spec, "$.functionName", RESOURCE_TYPE)?,
        required_str(spec, "$.name", RESOURCE_TYPE)?,
    ))
}

pub async fn deploy(remote: &RemoteCall<'_>, input: &DeployInput) -> Result<DeployOutput, ProviderError> {
    let spec = &input.desired_spec;
    let (context, operations) = match &input.previous_spec {
        None => {
            let operations: Vec<BoxedOperation<AliasSaveData>> = vec![
                Box::new(CreateAlias {
                    function_name: String::new(),
                    alias_name: String::new(),
                    body: RequestBody::new(),
                }),
                Box::new(ProvisionedConcurrency { pending: None }),
            ];
            (SaveContext::new(AliasSaveData::default()), operations)
        },
        Some(previous) => {
            let (function_name, alias_name) = lookup_names(previous)?;
            let data = AliasSaveData {
                function_name: Some(function_name),
                alias_name: Some(alias_name),
                alias_arn: optional_str(previous, "$.aliasArn")?,
            };
            let operations: Vec<BoxedOperation<AliasSaveData>> = vec![
                Box::new(UpdateAlias { body: RequestBody::new() }),
                Box::new(ProvisionedConcurrency { pending: None }),
            ];
            (SaveContext::new(data), operations)
        },
    };

    let result = run_save_operations(context, operations, spec, input.changes.as_ref(), remote).await;
    finish_deploy(ResourceKind::Alias, input, result, |context| {
        match &context.data.alias_arn {
            Some(arn) => json!({ "aliasArn": arn }),
            None => json!({}),
        }
    })
}

fn reconciler() -> StateReconciler<Value> {
    StateReconciler::new(
        |response: &Value| {
            let alias = &response["alias"];
            let member = |key: &str| {
                alias[key].as_str().ok_or_else(|| {
                    ProviderError::unexpected_response("GetAlias", format!("missing {}", key))
                })
            };
            let arn = member("AliasArn")?;
            let function = arn_segment(arn, 6).ok_or_else(|| {
                ProviderError::unexpected_response("GetAlias", format!("malformed alias ARN {}", arn))
            })?;
            Ok(json!({
                "functionName": keep_function_reference(function, response.get("knownFunctionName")),
                "name": member("Name")?,
                "functionVersion": member("FunctionVersion")?,
                "aliasArn": arn,
            }))
        },
        vec![
            OptionalValueExtractor::copy("description", "$.alias.Description", "$.description"),
            OptionalValueExtractor::copy(
                "routingConfig",
                "$.alias.RoutingConfig.AdditionalVersionWeights",
                "$.routingConfig.additionalVersionWeights",
            ),
            OptionalValueExtractor::copy(
                "provisionedConcurrency",
                "$.provisionedConcurrency.RequestedProvisionedConcurrentExecutions",
                PROVISIONED_PATH,
            ),
        ],
        &[],
    )
}

async fn provisioned_config(
    remote: &RemoteCall<'_>,
    function_name: &str,
    qualifier: &str,
) -> Result<Option<Value>, ProviderError> {
    let request = LambdaRequest::GetProvisionedConcurrencyConfig {
        function_name: function_name.to_string(),
        qualifier: qualifier.to_string(),
    };
    match remote.send(request).await {
        Ok(config) => Ok(Some(config)),
        Err(e) if e.is_not_found() || e.api_code() == Some(PROVISIONED_CONFIG_NOT_FOUND) => Ok(None),
        Err(e) => Err(e),
    }
}

pub async fn fetch(remote: &RemoteCall<'_>, input: &FetchInput) -> Result<Value, ProviderError> {
    let spec = &input.current_spec;
    let (function_name, alias_name) = lookup_names(spec)?;

    let Some(alias) = remote
        .send_optional(LambdaRequest::GetAlias {
            function_name: function_name.clone(),
            alias_name: alias_name.clone(),
        })
        .await?
    else {
        tracing::info!("Alias {}:{} does not exist", function_name, alias_name);
        return Ok(empty_state());
    };

    let provisioned = provisioned_config(remote, &function_name, &alias_name).await?;
    let response = json!({
        "alias": alias,
        "provisionedConcurrency": provisioned,
        "knownFunctionName": spec.get("functionName"),
    });
    reconciler().reconcile(&response, Some(spec))
}

pub async fn destroy(remote: &RemoteCall<'_>, input: &DestroyInput) -> Result<(), ProviderError> {
    let (function_name, alias_name) = lookup_names(&input.previous_spec)?;
    delete_resource(
        remote,
        LambdaRequest::DeleteAlias {
            function_name,
            alias_name,
        },
    )
    .await
}

/// Ready once provisioned concurrency (if any) has been allocated
pub async fn stabilised(remote: &RemoteCall<'_>, input: &StabilisedInput) -> Result<bool, ProviderError> {
    let spec = &input.current_spec;
    if !FieldPath::parse(PROVISIONED_PATH)?.has(spec) {
        return Ok(true);
    }

    let (function_name, alias_name) = lookup_names(spec)?;
    let Some(config) = provisioned_config(remote, &function_name, &alias_name).await? else {
        return Ok(false);
    };

    match config["Status"].as_str() {
        Some("READY") => Ok(true),
        Some("FAILED") => Err(ProviderError::ResourceFailed {
            resource_type: RESOURCE_TYPE,
            resource_id: format!("{}:{}", function_name, alias_name),
            reason: config["StatusReason"]
                .as_str()
                .unwrap_or("provisioned concurrency allocation failed")
                .to_string(),
        }),
        status => {
            tracing::debug!("Provisioned concurrency status {:?}", status);
            Ok(false)
        },
    }
}
