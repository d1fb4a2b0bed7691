//! Lambda function (`aws/lambda/function`)
//!
//! Creating a function is one `CreateFunction` call followed by the
//! sub-configurations that have their own endpoints: reserved concurrency,
//! recursion detection and runtime management. Updates split the function
//! configuration from its code, and manage code signing and tags through
//! their dedicated calls.
//!
//! Code locations are input-only: the API never echoes the upload source, so
//! fetch carries them over from the known spec and updates never clear them.

use super::fields::{
    config_change, optional_str, required_str, response_str, ConfigChange,
};
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
use crate::spec::shape::{api_shape, pick, spec_shape};
use crate::spec::tags::{tags_from_spec, tags_to_api, tags_to_spec};
use async_trait::async_trait;
use serde_json::{json, Value};

pub const RESOURCE_TYPE: &str = "aws/lambda/function";

/// Fields the API accepts but never returns
pub const INPUT_ONLY_FIELDS: &[&str] = &[
    "$.code.zipFile",
    "$.code.s3Bucket",
    "$.code.s3Key",
    "$.code.s3ObjectVersion",
    "$.code.sourceKMSKeyArn",
    "$.runtimeManagementConfig.runtimeVersionArn",
];

/// Code fields and their `UpdateFunctionCode` members
const CODE_FIELDS: &[(&str, &str)] = &[
    ("$.code.zipFile", "ZipFile"),
    ("$.code.s3Bucket", "S3Bucket"),
    ("$.code.s3Key", "S3Key"),
    ("$.code.s3ObjectVersion", "S3ObjectVersion"),
    ("$.code.imageUri", "ImageUri"),
    ("$.code.sourceKMSKeyArn", "SourceKMSKeyArn"),
    ("$.architectures", "Architectures"),
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionSaveData {
    pub function_name: Option<String>,
    pub arn: Option<String>,
}

type Context = SaveContext<FunctionSaveData>;

fn function_name(context: &Context) -> Result<String, ProviderError> {
    context
        .data
        .function_name
        .clone()
        .ok_or_else(|| ProviderError::invariant("function name missing from save context"))
}

/// Setters shared by CreateFunction and UpdateFunctionConfiguration
fn configuration_setters() -> Vec<ValueSetter<RequestBody>> {
    vec![
        ValueSetter::field("$.role", "Role"),
        ValueSetter::field("$.runtime", "Runtime"),
        ValueSetter::field("$.handler", "Handler"),
        ValueSetter::field("$.description", "Description"),
        ValueSetter::field("$.timeout", "Timeout"),
        ValueSetter::field("$.memorySize", "MemorySize"),
        // Variable names are user data; copied without key conversion
        ValueSetter::new("$.environment.variables", |value, body: &mut RequestBody| {
            body.insert("Environment".to_string(), json!({ "Variables": value }));
        }),
        ValueSetter::field("$.layers", "Layers"),
        ValueSetter::field("$.kmsKeyArn", "KMSKeyArn"),
        ValueSetter::shaped("$.tracingConfig", "TracingConfig"),
        ValueSetter::shaped("$.vpcConfig", "VpcConfig"),
        ValueSetter::shaped("$.deadLetterConfig", "DeadLetterConfig"),
        ValueSetter::shaped("$.ephemeralStorage", "EphemeralStorage"),
        ValueSetter::shaped("$.loggingConfig", "LoggingConfig"),
        ValueSetter::shaped("$.snapStart", "SnapStart"),
        ValueSetter::shaped("$.fileSystemConfigs", "FileSystemConfigs"),
        ValueSetter::shaped("$.imageConfig", "ImageConfig"),
    ]
}

/// Values sent when a configuration field is removed from the spec
fn cleared_configuration() -> Vec<(&'static str, &'static str, Value)> {
    vec![
        ("$.description", "Description", json!("")),
        ("$.environment", "Environment", json!({"Variables": {}})),
        ("$.layers", "Layers", json!([])),
        ("$.kmsKeyArn", "KMSKeyArn", json!("")),
        ("$.tracingConfig", "TracingConfig", json!({"Mode": "PassThrough"})),
        ("$.vpcConfig", "VpcConfig", json!({"SubnetIds": [], "SecurityGroupIds": []})),
        ("$.deadLetterConfig", "DeadLetterConfig", json!({"TargetArn": ""})),
        ("$.fileSystemConfigs", "FileSystemConfigs", json!([])),
        // Service defaults
        ("$.timeout", "Timeout", json!(3)),
        ("$.memorySize", "MemorySize", json!(128)),
        ("$.ephemeralStorage", "EphemeralStorage", json!({"Size": 512})),
        ("$.loggingConfig", "LoggingConfig", json!({"LogFormat": "Text"})),
        ("$.snapStart", "SnapStart", json!({"ApplyOn": "None"})),
        (
            "$.imageConfig",
            "ImageConfig",
            json!({"EntryPoint": [], "Command": [], "WorkingDirectory": ""}),
        ),
    ]
}

// =============================================================================
// Save steps
// =============================================================================

struct CreateFunction {
    setters: ValueSetterSet<RequestBody>,
    body: RequestBody,
}

impl CreateFunction {
    fn new() -> Self {
        let mut setters = configuration_setters();
        setters.extend([
            ValueSetter::field("$.packageType", "PackageType"),
            ValueSetter::field("$.architectures", "Architectures"),
            ValueSetter::shaped("$.code", "Code"),
            ValueSetter::field("$.codeSigningConfigArn", "CodeSigningConfigArn"),
        ]);
        Self {
            setters: ValueSetterSet::new(setters),
            body: RequestBody::new(),
        }
    }
}

#[async_trait]
impl SaveOperation<FunctionSaveData> for CreateFunction {
    fn name(&self) -> &'static str {
        "CreateFunction"
    }

    fn prepare(
        &mut self,
        _context: &Context,
        spec: &Value,
        _changes: Option<&ResourceChanges>,
    ) -> Result<bool, ProviderError> {
        let name = required_str(spec, "$.functionName", RESOURCE_TYPE)?;
        required_str(spec, "$.role", RESOURCE_TYPE)?;

        self.body = RequestBody::new();
        self.body.insert("FunctionName".to_string(), Value::String(name));
        self.setters.apply(spec, None, &mut self.body)?;

        let tags = tags_from_spec(spec, TAGS_PATH)?;
        if !tags.is_empty() {
            self.body.insert("Tags".to_string(), tags_to_api(&tags));
        }
        Ok(true)
    }

    async fn execute(&mut self, context: &mut Context, remote: &RemoteCall<'_>) -> Result<(), ProviderError> {
        let body = Value::Object(std::mem::take(&mut self.body));
        let response = remote.send(LambdaRequest::CreateFunction { body }).await?;

        let arn = response_str(&response, "FunctionArn", "CreateFunction")?;
        let name = response_str(&response, "FunctionName", "CreateFunction")?;
        tracing::info!("Created function {}", arn);

        context.data.function_name = Some(name);
        context.data.arn = Some(arn.clone());
        context.set_upstream_id(arn);
        Ok(())
    }
}

struct UpdateFunctionConfiguration {
    setters: ValueSetterSet<RequestBody>,
    body: RequestBody,
    function_name: Option<String>,
}

impl UpdateFunctionConfiguration {
    fn new() -> Self {
        Self {
            setters: configuration_setters()
                .into_iter()
                .map(ValueSetter::when_changed)
                .collect(),
            body: RequestBody::new(),
            function_name: None,
        }
    }
}

#[async_trait]
impl SaveOperation<FunctionSaveData> for UpdateFunctionConfiguration {
    fn name(&self) -> &'static str {
        "UpdateFunctionConfiguration"
    }

    fn prepare(
        &mut self,
        context: &Context,
        spec: &Value,
        changes: Option<&ResourceChanges>,
    ) -> Result<bool, ProviderError> {
        self.body = RequestBody::new();
        let mut has_updates = self.setters.apply(spec, changes, &mut self.body)?;

        if let Some(changes) = changes {
            for (path, key, cleared) in cleared_configuration() {
                let field = FieldPath::parse(path)?;
                if changes.was_removed(&field) && !field.has(spec) {
                    tracing::debug!("Clearing {}", path);
                    self.body.insert(key.to_string(), cleared);
                    has_updates = true;
                }
            }
        }

        if has_updates {
            self.function_name = Some(function_name(context)?);
        }
        Ok(has_updates)
    }

    async fn execute(&mut self, context: &mut Context, remote: &RemoteCall<'_>) -> Result<(), ProviderError> {
        let function_name = match self.function_name.take() {
            Some(name) => name,
            None => function_name(context)?,
        };
        let body = Value::Object(std::mem::take(&mut self.body));
        let response = remote
            .send(LambdaRequest::UpdateFunctionConfiguration { function_name, body })
            .await?;

        if context.data.arn.is_none() {
            context.data.arn = response.get("FunctionArn").and_then(|v| v.as_str()).map(String::from);
        }
        Ok(())
    }
}

/// Upload new code when a code location changed.
///
/// Removing a code field never triggers an upload; the locations are
/// input-only and their absence says nothing about the deployed code.
struct UpdateFunctionCode {
    body: RequestBody,
}

#[async_trait]
impl SaveOperation<FunctionSaveData> for UpdateFunctionCode {
    fn name(&self) -> &'static str {
        "UpdateFunctionCode"
    }

    fn prepare(
        &mut self,
        _context: &Context,
        spec: &Value,
        changes: Option<&ResourceChanges>,
    ) -> Result<bool, ProviderError> {
        let changed: ValueSetterSet<RequestBody> = CODE_FIELDS
            .iter()
            .map(|&(path, key)| ValueSetter::field(path, key).when_changed())
            .collect();
        let mut probe = RequestBody::new();
        if !changed.apply(spec, changes, &mut probe)? {
            return Ok(false);
        }

        // The call replaces the whole code location, so send every present field
        let all: ValueSetterSet<RequestBody> = CODE_FIELDS
            .iter()
            .map(|&(path, key)| ValueSetter::field(path, key))
            .collect();
        self.body = RequestBody::new();
        all.apply(spec, None, &mut self.body)?;
        Ok(true)
    }

    async fn execute(&mut self, context: &mut Context, remote: &RemoteCall<'_>) -> Result<(), ProviderError> {
        let body = Value::Object(std::mem::take(&mut self.body));
        remote
            .send(LambdaRequest::UpdateFunctionCode {
                function_name: function_name(context)?,
                body,
            })
            .await?;
        Ok(())
    }
}

type RequestBuilder = fn(String, ConfigChange) -> Result<LambdaRequest, ProviderError>;

/// A function sub-configuration with its own put/delete endpoint
struct FunctionSubConfig {
    name: &'static str,
    path: &'static str,
    request: RequestBuilder,
    pending: Option<LambdaRequest>,
}

impl FunctionSubConfig {
    fn concurrency() -> Self {
        Self {
            name: "FunctionConcurrency",
            path: "$.reservedConcurrentExecutions",
            request: |function_name, change| match change {
                ConfigChange::Put(value) => Ok(LambdaRequest::PutFunctionConcurrency {
                    function_name,
                    reserved_concurrent_executions: value.as_i64().ok_or_else(|| {
                        ProviderError::invalid_value("$.reservedConcurrentExecutions", "expected an integer")
                    })?,
                }),
                ConfigChange::Clear => Ok(LambdaRequest::DeleteFunctionConcurrency { function_name }),
            },
            pending: None,
        }
    }

    fn recursion() -> Self {
        Self {
            name: "FunctionRecursionConfig",
            path: "$.recursiveLoop",
            request: |function_name, change| {
                let recursive_loop = match change {
                    ConfigChange::Put(Value::String(mode)) => mode,
                    ConfigChange::Put(_) => {
                        return Err(ProviderError::invalid_value("$.recursiveLoop", "expected a string"))
                    },
                    ConfigChange::Clear => "Terminate".to_string(),
                };
                Ok(LambdaRequest::PutFunctionRecursionConfig {
                    function_name,
                    recursive_loop,
                })
            },
            pending: None,
        }
    }

    fn runtime_management() -> Self {
        Self {
            name: "RuntimeManagementConfig",
            path: "$.runtimeManagementConfig",
            request: |function_name, change| {
                let body = match change {
                    ConfigChange::Put(config) => api_shape(&config),
                    ConfigChange::Clear => json!({"UpdateRuntimeOn": "Auto"}),
                };
                Ok(LambdaRequest::PutRuntimeManagementConfig {
                    function_name,
                    body,
                })
            },
            pending: None,
        }
    }

    fn code_signing() -> Self {
        Self {
            name: "FunctionCodeSigningConfig",
            path: "$.codeSigningConfigArn",
            request: |function_name, change| match change {
                ConfigChange::Put(Value::String(code_signing_config_arn)) => {
                    Ok(LambdaRequest::PutFunctionCodeSigningConfig {
                        function_name,
                        code_signing_config_arn,
                    })
                },
                ConfigChange::Put(_) => Err(ProviderError::invalid_value(
                    "$.codeSigningConfigArn",
                    "expected a string",
                )),
                ConfigChange::Clear => Ok(LambdaRequest::DeleteFunctionCodeSigningConfig { function_name }),
            },
            pending: None,
        }
    }
}

#[async_trait]
impl SaveOperation<FunctionSaveData> for FunctionSubConfig {
    fn name(&self) -> &'static str {
        self.name
    }

    fn prepare(
        &mut self,
        context: &Context,
        spec: &Value,
        changes: Option<&ResourceChanges>,
    ) -> Result<bool, ProviderError> {
        let Some(change) = config_change(spec, self.path, changes)? else {
            return Ok(false);
        };
        self.pending = Some((self.request)(function_name(context)?, change)?);
        Ok(true)
    }

    async fn execute(&mut self, _context: &mut Context, remote: &RemoteCall<'_>) -> Result<(), ProviderError> {
        let request = self
            .pending
            .take()
            .ok_or_else(|| ProviderError::invariant(format!("{} executed before prepare", self.name)))?;
        remote.send(request).await?;
        Ok(())
    }
}

fn function_arn(context: &Context) -> Option<String> {
    context.data.arn.clone()
}

fn create_operations() -> Vec<BoxedOperation<FunctionSaveData>> {
    vec![
        Box::new(CreateFunction::new()),
        Box::new(FunctionSubConfig::concurrency()),
        Box::new(FunctionSubConfig::recursion()),
        Box::new(FunctionSubConfig::runtime_management()),
    ]
}

fn update_operations(previous: &Value) -> Result<Vec<BoxedOperation<FunctionSaveData>>, ProviderError> {
    let operations: Vec<BoxedOperation<FunctionSaveData>> = vec![
        Box::new(UpdateFunctionConfiguration::new()),
        Box::new(UpdateFunctionCode { body: RequestBody::new() }),
        Box::new(FunctionSubConfig::concurrency()),
        Box::new(FunctionSubConfig::recursion()),
        Box::new(FunctionSubConfig::runtime_management()),
        Box::new(FunctionSubConfig::code_signing()),
        Box::new(UpdateTags::new(tags_from_spec(previous, TAGS_PATH)?, function_arn)),
    ];
    Ok(operations)
}

// =============================================================================
// Lifecycle
// =============================================================================

/// Lookup key: the ARN once known, else the function name
fn lookup_key(spec: &Value) -> Result<String, ProviderError> {
    match optional_str(spec, "$.arn")? {
        Some(arn) => Ok(arn),
        None => required_str(spec, "$.functionName", RESOURCE_TYPE),
    }
}

pub async fn deploy(remote: &RemoteCall<'_>, input: &DeployInput) -> Result<DeployOutput, ProviderError> {
    let spec = &input.desired_spec;
    let (context, operations) = match &input.previous_spec {
        None => (SaveContext::new(FunctionSaveData::default()), create_operations()),
        Some(previous) => {
            let data = FunctionSaveData {
                function_name: optional_str(previous, "$.functionName")?
                    .or(optional_str(spec, "$.functionName")?),
                arn: optional_str(previous, "$.arn")?,
            };
            (SaveContext::new(data), update_operations(previous)?)
        },
    };

    let result = run_save_operations(context, operations, spec, input.changes.as_ref(), remote).await;
    finish_deploy(ResourceKind::Function, input, result, |context| match &context.data.arn {
        Some(arn) => json!({ "arn": arn }),
        None => json!({}),
    })
}

fn reconciler() -> StateReconciler<Value> {
    StateReconciler::new(
        |response: &Value| {
            let config = &response["function"]["Configuration"];
            let member = |key: &str| {
                config[key].as_str().map(String::from).ok_or_else(|| {
                    ProviderError::unexpected_response("GetFunction", format!("missing Configuration.{}", key))
                })
            };
            Ok(json!({
                "functionName": member("FunctionName")?,
                "role": member("Role")?,
                "arn": member("FunctionArn")?,
            }))
        },
        vec![
            OptionalValueExtractor::copy("runtime", "$.function.Configuration.Runtime", "$.runtime"),
            OptionalValueExtractor::copy("handler", "$.function.Configuration.Handler", "$.handler"),
            OptionalValueExtractor::copy(
                "description",
                "$.function.Configuration.Description",
                "$.description",
            ),
            OptionalValueExtractor::copy("timeout", "$.function.Configuration.Timeout", "$.timeout"),
            OptionalValueExtractor::copy(
                "memorySize",
                "$.function.Configuration.MemorySize",
                "$.memorySize",
            ),
            OptionalValueExtractor::copy(
                "packageType",
                "$.function.Configuration.PackageType",
                "$.packageType",
            ),
            OptionalValueExtractor::copy(
                "architectures",
                "$.function.Configuration.Architectures",
                "$.architectures",
            ),
            OptionalValueExtractor::copy(
                "environment",
                "$.function.Configuration.Environment.Variables",
                "$.environment.variables",
            ),
            OptionalValueExtractor::map("layers", "$.function.Configuration.Layers", "$.layers", |layers| {
                layers.as_array().map(|layers| {
                    Value::Array(layers.iter().filter_map(|l| l.get("Arn").cloned()).collect())
                })
            }),
            OptionalValueExtractor::copy("kmsKeyArn", "$.function.Configuration.KMSKeyArn", "$.kmsKeyArn"),
            OptionalValueExtractor::copy(
                "tracingConfig",
                "$.function.Configuration.TracingConfig.Mode",
                "$.tracingConfig.mode",
            ),
            OptionalValueExtractor::map("vpcConfig", "$.function.Configuration.VpcConfig", "$.vpcConfig", |vpc| {
                let attached = ["SubnetIds", "SecurityGroupIds"]
                    .iter()
                    .any(|k| vpc[*k].as_array().is_some_and(|ids| !ids.is_empty()));
                if !attached {
                    return None;
                }
                pick(vpc, &["SubnetIds", "SecurityGroupIds", "Ipv6AllowedForDualStack"]).map(|v| spec_shape(&v))
            }),
            OptionalValueExtractor::copy(
                "deadLetterConfig",
                "$.function.Configuration.DeadLetterConfig.TargetArn",
                "$.deadLetterConfig.targetArn",
            ),
            OptionalValueExtractor::copy(
                "ephemeralStorage",
                "$.function.Configuration.EphemeralStorage.Size",
                "$.ephemeralStorage.size",
            ),
            OptionalValueExtractor::map(
                "loggingConfig",
                "$.function.Configuration.LoggingConfig",
                "$.loggingConfig",
                |logging| {
                    pick(logging, &["LogFormat", "ApplicationLogLevel", "SystemLogLevel", "LogGroup"])
                        .map(|v| spec_shape(&v))
                },
            ),
            OptionalValueExtractor::copy(
                "snapStart",
                "$.function.Configuration.SnapStart.ApplyOn",
                "$.snapStart.applyOn",
            ),
            OptionalValueExtractor::map(
                "fileSystemConfigs",
                "$.function.Configuration.FileSystemConfigs",
                "$.fileSystemConfigs",
                |configs| Some(spec_shape(configs)),
            ),
            OptionalValueExtractor::map(
                "imageConfig",
                "$.function.Configuration.ImageConfigResponse.ImageConfig",
                "$.imageConfig",
                |config| Some(spec_shape(config)),
            ),
            OptionalValueExtractor::copy("imageUri", "$.function.Code.ImageUri", "$.code.imageUri"),
            OptionalValueExtractor::copy(
                "reservedConcurrentExecutions",
                "$.function.Concurrency.ReservedConcurrentExecutions",
                "$.reservedConcurrentExecutions",
            ),
            OptionalValueExtractor::copy(
                "recursiveLoop",
                "$.recursionConfig.RecursiveLoop",
                "$.recursiveLoop",
            ),
            OptionalValueExtractor::new(
                "runtimeManagementConfig",
                vec![
                    "$.runtimeManagementConfig.updateRuntimeOn",
                    "$.runtimeManagementConfig.runtimeVersionArn",
                ],
                |r: &Value| r["runtimeManagementConfig"]["UpdateRuntimeOn"].is_string(),
                |r: &Value| {
                    let config = &r["runtimeManagementConfig"];
                    Ok(vec![
                        config.get("UpdateRuntimeOn").cloned(),
                        config
                            .get("RuntimeVersionArn")
                            .filter(|v| v.as_str().is_some_and(|s| !s.is_empty()))
                            .cloned(),
                    ])
                },
            ),
            OptionalValueExtractor::copy(
                "codeSigningConfigArn",
                "$.codeSigningConfig.CodeSigningConfigArn",
                "$.codeSigningConfigArn",
            ),
            OptionalValueExtractor::new(
                "tags",
                vec![TAGS_PATH],
                |r: &Value| r["function"]["Tags"].as_object().is_some_and(|t| !t.is_empty()),
                |r: &Value| {
                    let known = tags_from_spec(r, "$.knownTags")?;
                    let remote = r["function"]["Tags"].as_object().cloned().unwrap_or_default();
                    Ok(vec![Some(tags_to_spec(&remote, &known))])
                },
            ),
        ],
        INPUT_ONLY_FIELDS,
    )
}

pub async fn fetch(remote: &RemoteCall<'_>, input: &FetchInput) -> Result<Value, ProviderError> {
    let spec = &input.current_spec;
    let key = lookup_key(spec)?;

    let Some(function) = remote
        .send_optional(LambdaRequest::GetFunction { function_name: key.clone() })
        .await?
    else {
        tracing::info!("Function {} does not exist", key);
        return Ok(empty_state());
    };

    let name = function["Configuration"]["FunctionName"]
        .as_str()
        .map(String::from)
        .unwrap_or(key);

    let recursion = remote
        .send_optional(LambdaRequest::GetFunctionRecursionConfig { function_name: name.clone() })
        .await?;
    let runtime_management = remote
        .send_optional(LambdaRequest::GetRuntimeManagementConfig { function_name: name.clone() })
        .await?;
    let code_signing = remote
        .send_optional(LambdaRequest::GetFunctionCodeSigningConfig { function_name: name })
        .await?;

    let response = json!({
        "function": function,
        "recursionConfig": recursion,
        "runtimeManagementConfig": runtime_management,
        "codeSigningConfig": code_signing,
        "knownTags": known_tags(spec),
    });
    reconciler().reconcile(&response, Some(spec))
}

pub async fn destroy(remote: &RemoteCall<'_>, input: &DestroyInput) -> Result<(), ProviderError> {
    let function_name = lookup_key(&input.previous_spec)?;
    delete_resource(remote, LambdaRequest::DeleteFunction { function_name }).await
}

/// Active (or Inactive) with no update in progress
pub async fn stabilised(remote: &RemoteCall<'_>, input: &StabilisedInput) -> Result<bool, ProviderError> {
    let key = lookup_key(&input.current_spec)?;
    let function = remote
        .send(LambdaRequest::GetFunction { function_name: key.clone() })
        .await?;

    let config = &function["Configuration"];
    let state = config["State"].as_str().unwrap_or("Active");
    let last_update = config["LastUpdateStatus"].as_str().unwrap_or("Successful");

    if state == "Failed" || last_update == "Failed" {
        let reason = config["StateReason"]
            .as_str()
            .or(config["LastUpdateStatusReason"].as_str())
            .unwrap_or("no reason given");
        return Err(ProviderError::ResourceFailed {
            resource_type: RESOURCE_TYPE,
            resource_id: key,
            reason: reason.to_string(),
        });
    }

    tracing::debug!("Function {} state={} lastUpdateStatus={}", key, state, last_update);
    Ok(matches!(state, "Active" | "Inactive") && last_update != "InProgress")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::changes::FieldChange;

    fn get_function_response() -> Value {
        json!({
            "Configuration": {
                "FunctionName": "orders",
                "FunctionArn": "arn:aws:lambda:us-east-1:123456789012:function:orders",
                "Role": "arn:aws:iam::123456789012:role/orders",
                "Runtime": "python3.12",
                "Handler": "app.handler",
                "Description": "",
                "Timeout": 30,
                "MemorySize": 256,
                "Environment": {"Variables": {"TABLE_NAME": "orders"}},
                "VpcConfig": {"SubnetIds": [], "SecurityGroupIds": [], "VpcId": ""},
                "TracingConfig": {"Mode": "PassThrough"},
                "Layers": [{"Arn": "arn:aws:lambda:us-east-1:123456789012:layer:deps:3", "CodeSize": 100}],
                "State": "Active",
                "LastUpdateStatus": "Successful"
            },
            "Code": {"RepositoryType": "S3", "Location": "https://example.invalid/presigned"},
            "Tags": {"team": "payments", "env": "prod"}
        })
    }

    #[test]
    fn test_reconcile_function_response() {
        let previous = json!({
            "functionName": "orders",
            "code": {"s3Bucket": "artifacts", "s3Key": "orders.zip"},
            "tags": [{"key": "team", "value": "payments"}]
        });
        let response = json!({
            "function": get_function_response(),
            "recursionConfig": {"RecursiveLoop": "Terminate"},
            "runtimeManagementConfig": {"UpdateRuntimeOn": "Auto"},
            "codeSigningConfig": null,
            "knownTags": previous["tags"],
        });

        let state = reconciler().reconcile(&response, Some(&previous)).unwrap();
        assert_eq!(state["arn"], "arn:aws:lambda:us-east-1:123456789012:function:orders");
        assert_eq!(state["code"], json!({"s3Bucket": "artifacts", "s3Key": "orders.zip"}));
        assert_eq!(state["environment"], json!({"variables": {"TABLE_NAME": "orders"}}));
        assert_eq!(state["layers"], json!(["arn:aws:lambda:us-east-1:123456789012:layer:deps:3"]));
        assert_eq!(
            state["tags"],
            json!([{"key": "team", "value": "payments"}, {"key": "env", "value": "prod"}])
        );
        assert_eq!(state["runtimeManagementConfig"], json!({"updateRuntimeOn": "Auto"}));
        assert!(state.get("description").is_none());
        assert!(state.get("vpcConfig").is_none());
        assert!(state.get("codeSigningConfigArn").is_none());
    }

    #[test]
    fn test_create_requires_role() {
        let mut step = CreateFunction::new();
        let context = SaveContext::new(FunctionSaveData::default());
        let err = step
            .prepare(&context, &json!({"functionName": "orders"}), None)
            .unwrap_err();
        assert!(matches!(err, ProviderError::MissingField { .. }));
    }

    #[test]
    fn test_create_body() {
        let mut step = CreateFunction::new();
        let context = SaveContext::new(FunctionSaveData::default());
        let spec = json!({
            "functionName": "orders",
            "role": "arn:aws:iam::123456789012:role/orders",
            "runtime": "python3.12",
            "code": {"s3Bucket": "artifacts", "s3Key": "orders.zip"},
            "environment": {"variables": {"table_name": "orders"}},
            "tags": [{"key": "team", "value": "payments"}]
        });
        assert!(step.prepare(&context, &spec, None).unwrap());
        assert_eq!(
            Value::Object(step.body.clone()),
            json!({
                "FunctionName": "orders",
                "Role": "arn:aws:iam::123456789012:role/orders",
                "Runtime": "python3.12",
                "Code": {"S3Bucket": "artifacts", "S3Key": "orders.zip"},
                "Environment": {"Variables": {"table_name": "orders"}},
                "Tags": {"team": "payments"}
            })
        );
    }

    #[test]
    fn test_configuration_update_clears_removed_fields() {
        let mut step = UpdateFunctionConfiguration::new();
        let context = SaveContext::new(FunctionSaveData {
            function_name: Some("orders".to_string()),
            arn: None,
        });
        let changes = ResourceChanges {
            modified_fields: vec![FieldChange::new("$.timeout")],
            removed_fields: vec!["$.description".to_string()],
            ..Default::default()
        };
        let spec = json!({"functionName": "orders", "timeout": 60, "memorySize": 256});

        assert!(step.prepare(&context, &spec, Some(&changes)).unwrap());
        assert_eq!(
            Value::Object(step.body.clone()),
            json!({"Timeout": 60, "Description": ""})
        );
    }

    #[test]
    fn test_removed_sizing_falls_back_to_service_defaults() {
        let mut step = UpdateFunctionConfiguration::new();
        let context = SaveContext::new(FunctionSaveData {
            function_name: Some("orders".to_string()),
            arn: None,
        });
        let changes = ResourceChanges {
            removed_fields: vec![
                "$.timeout".to_string(),
                "$.memorySize".to_string(),
                "$.snapStart".to_string(),
            ],
            ..Default::default()
        };
        let spec = json!({"functionName": "orders", "role": "arn:aws:iam::123456789012:role/orders"});

        assert!(step.prepare(&context, &spec, Some(&changes)).unwrap());
        assert_eq!(
            Value::Object(step.body.clone()),
            json!({"Timeout": 3, "MemorySize": 128, "SnapStart": {"ApplyOn": "None"}})
        );
    }

    #[test]
    fn test_removed_code_location_does_not_upload() {
        let mut step = UpdateFunctionCode { body: RequestBody::new() };
        let context = SaveContext::new(FunctionSaveData::default());
        let changes = ResourceChanges {
            removed_fields: vec!["$.code.s3ObjectVersion".to_string()],
            ..Default::default()
        };
        let spec = json!({"code": {"s3Bucket": "artifacts", "s3Key": "orders.zip"}});
        assert!(!step.prepare(&context, &spec, Some(&changes)).unwrap());
    }

    #[test]
    fn test_changed_code_location_sends_full_location() {
        let mut step = UpdateFunctionCode { body: RequestBody::new() };
        let context = SaveContext::new(FunctionSaveData::default());
        let changes = ResourceChanges {
            modified_fields: vec![FieldChange::new("$.code.s3Key")],
            ..Default::default()
        };
        let spec = json!({"code": {"s3Bucket": "artifacts", "s3Key": "orders-v2.zip"}});
        assert!(step.prepare(&context, &spec, Some(&changes)).unwrap());
        assert_eq!(
            Value::Object(step.body.clone()),
            json!({"S3Bucket": "artifacts", "S3Key": "orders-v2.zip"})
        );
    }

    #[test]
    fn test_removed_concurrency_is_deleted() {
        let mut step = FunctionSubConfig::concurrency();
        let context = SaveContext::new(FunctionSaveData {
            function_name: Some("orders".to_string()),
            arn: None,
        });
        let changes = ResourceChanges {
            removed_fields: vec!["$.reservedConcurrentExecutions".to_string()],
            ..Default::default()
        };
        assert!(step.prepare(&context, &json!({}), Some(&changes)).unwrap());
        assert_eq!(
            step.pending,
            Some(LambdaRequest::DeleteFunctionConcurrency {
                function_name: "orders".to_string()
            })
        );
    }

    #[test]
    fn test_sub_config_without_function_name_is_invariant_violation() {
        let mut step = FunctionSubConfig::recursion();
        let context = SaveContext::new(FunctionSaveData::default());
        let err = step
            .prepare(&context, &json!({"recursiveLoop": "Allow"}), None)
            .unwrap_err();
        assert!(err.is_invariant_violation());
    }
}
