//! Lambda API requests
//!
//! One variant per remote operation. [`LambdaRequest::route`] maps each to
//! its REST route (method, path, query, body).

use reqwest::Method;
use serde_json::{json, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum LambdaRequest {
    // Functions
    CreateFunction { body: Value },
    GetFunction { function_name: String },
    UpdateFunctionConfiguration { function_name: String, body: Value },
    UpdateFunctionCode { function_name: String, body: Value },
    DeleteFunction { function_name: String },
    PutFunctionConcurrency { function_name: String, reserved_concurrent_executions: i64 },
    DeleteFunctionConcurrency { function_name: String },
    GetFunctionRecursionConfig { function_name: String },
    PutFunctionRecursionConfig { function_name: String, recursive_loop: String },
    GetRuntimeManagementConfig { function_name: String },
    PutRuntimeManagementConfig { function_name: String, body: Value },
    GetFunctionCodeSigningConfig { function_name: String },
    PutFunctionCodeSigningConfig { function_name: String, code_signing_config_arn: String },
    DeleteFunctionCodeSigningConfig { function_name: String },

    // Tags
    TagResource { resource_arn: String, tags: BTreeMap<String, String> },
    UntagResource { resource_arn: String, tag_keys: Vec<String> },
    ListTags { resource_arn: String },

    // Aliases
    CreateAlias { function_name: String, body: Value },
    GetAlias { function_name: String, alias_name: String },
    UpdateAlias { function_name: String, alias_name: String, body: Value },
    DeleteAlias { function_name: String, alias_name: String },
    PutProvisionedConcurrencyConfig { function_name: String, qualifier: String, provisioned_concurrent_executions: i64 },
    GetProvisionedConcurrencyConfig { function_name: String, qualifier: String },
    DeleteProvisionedConcurrencyConfig { function_name: String, qualifier: String },

    // Layers
    PublishLayerVersion { layer_name: String, body: Value },
    GetLayerVersion { layer_name: String, version_number: i64 },
    DeleteLayerVersion { layer_name: String, version_number: i64 },

    // Event source mappings
    CreateEventSourceMapping { body: Value },
    GetEventSourceMapping { uuid: String },
    UpdateEventSourceMapping { uuid: String, body: Value },
    DeleteEventSourceMapping { uuid: String },
}

/// A resolved REST route; `path` segments are already percent-encoded
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl Route {
    fn new(method: Method, segments: &[&str]) -> Self {
        let path = segments
            .iter()
            .map(|s| urlencoding::encode(s).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        Self {
            method,
            path: format!("/{}", path),
            query: Vec::new(),
            body: None,
        }
    }

    fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }
}

const FUNCTIONS: &str = "2015-03-31";
const CONCURRENCY: &str = "2017-10-31";
const TAGS: &str = "2017-03-31";
const PROVISIONED: &str = "2019-09-30";
const CODE_SIGNING: &str = "2020-06-30";
const RUNTIME_MANAGEMENT: &str = "2021-07-20";
const RECURSION: &str = "2024-08-31";
const LAYERS: &str = "2018-10-31";

impl LambdaRequest {
    /// API operation name, used in logs and error wrapping
    pub fn operation(&self) -> &'static str {
        match self {
            Self::CreateFunction { .. } => "CreateFunction",
            Self::GetFunction { .. } => "GetFunction",
            Self::UpdateFunctionConfiguration { .. } => "UpdateFunctionConfiguration",
            Self::UpdateFunctionCode { .. } => "UpdateFunctionCode",
            Self::DeleteFunction { .. } => "DeleteFunction",
            Self::PutFunctionConcurrency { .. } => "PutFunctionConcurrency",
            Self::DeleteFunctionConcurrency { .. } => "DeleteFunctionConcurrency",
            Self::GetFunctionRecursionConfig { .. } => "GetFunctionRecursionConfig",
            Self::PutFunctionRecursionConfig { .. } => "PutFunctionRecursionConfig",
            Self::GetRuntimeManagementConfig { .. } => "GetRuntimeManagementConfig",
            Self::PutRuntimeManagementConfig { .. } => "PutRuntimeManagementConfig",
            Self::GetFunctionCodeSigningConfig { .. } => "GetFunctionCodeSigningConfig",
            Self::PutFunctionCodeSigningConfig { .. } => "PutFunctionCodeSigningConfig",
            Self::DeleteFunctionCodeSigningConfig { .. } => "DeleteFunctionCodeSigningConfig",
            Self::TagResource { .. } => "TagResource",
            Self::UntagResource { .. } => "UntagResource",
            Self::ListTags { .. } => "ListTags",
            Self::CreateAlias { .. } => "CreateAlias",
            Self::GetAlias { .. } => "GetAlias",
            Self::UpdateAlias { .. } => "UpdateAlias",
            Self::DeleteAlias { .. } => "DeleteAlias",
            Self::PutProvisionedConcurrencyConfig { .. } => "PutProvisionedConcurrencyConfig",
            Self::GetProvisionedConcurrencyConfig { .. } => "GetProvisionedConcurrencyConfig",
            Self::DeleteProvisionedConcurrencyConfig { .. } => "DeleteProvisionedConcurrencyConfig",
            Self::PublishLayerVersion { .. } => "PublishLayerVersion",
            Self::GetLayerVersion { .. } => "GetLayerVersion",
            Self::DeleteLayerVersion { .. } => "DeleteLayerVersion",
            Self::CreateEventSourceMapping { .. } => "CreateEventSourceMapping",
            Self::GetEventSourceMapping { .. } => "GetEventSourceMapping",
            Self::UpdateEventSourceMapping { .. } => "UpdateEventSourceMapping",
            Self::DeleteEventSourceMapping { .. } => "DeleteEventSourceMapping",
        }
    }

    pub fn route(&self) -> Route {
        match self {
            Self::CreateFunction { body } => {
                Route::new(Method::POST, &[FUNCTIONS, "functions"]).with_body(body.clone())
            },
            Self::GetFunction { function_name } => {
                Route::new(Method::GET, &[FUNCTIONS, "functions", function_name])
            },
            Self::UpdateFunctionConfiguration { function_name, body } => Route::new(
                Method::PUT,
                &[FUNCTIONS, "functions", function_name, "configuration"],
            )
            .with_body(body.clone()),
            Self::UpdateFunctionCode { function_name, body } => {
                Route::new(Method::PUT, &[FUNCTIONS, "functions", function_name, "code"])
                    .with_body(body.clone())
            },
            Self::DeleteFunction { function_name } => {
                Route::new(Method::DELETE, &[FUNCTIONS, "functions", function_name])
            },
            Self::PutFunctionConcurrency {
                function_name,
                reserved_concurrent_executions,
            } => Route::new(
                Method::PUT,
                &[CONCURRENCY, "functions", function_name, "concurrency"],
            )
            .with_body(json!({ "ReservedConcurrentExecutions": reserved_concurrent_executions })),
            Self::DeleteFunctionConcurrency { function_name } => Route::new(
                Method::DELETE,
                &[CONCURRENCY, "functions", function_name, "concurrency"],
            ),
            Self::GetFunctionRecursionConfig { function_name } => Route::new(
                Method::GET,
                &[RECURSION, "functions", function_name, "recursion-config"],
            ),
            Self::PutFunctionRecursionConfig {
                function_name,
                recursive_loop,
            } => Route::new(
                Method::PUT,
                &[RECURSION, "functions", function_name, "recursion-config"],
            )
            .with_body(json!({ "RecursiveLoop": recursive_loop })),
            Self::GetRuntimeManagementConfig { function_name } => Route::new(
                Method::GET,
                &[RUNTIME_MANAGEMENT, "functions", function_name, "runtime-management-config"],
            ),
            Self::PutRuntimeManagementConfig { function_name, body } => Route::new(
                Method::PUT,
                &[RUNTIME_MANAGEMENT, "functions", function_name, "runtime-management-config"],
            )
            .with_body(body.clone()),
            Self::GetFunctionCodeSigningConfig { function_name } => Route::new(
                Method::GET,
                &[CODE_SIGNING, "functions", function_name, "code-signing-config"],
            ),
            Self::PutFunctionCodeSigningConfig {
                function_name,
                code_signing_config_arn,
            } => Route::new(
                Method::PUT,
                &[CODE_SIGNING, "functions", function_name, "code-signing-config"],
            )
            .with_body(json!({ "CodeSigningConfigArn": code_signing_config_arn })),
            Self::DeleteFunctionCodeSigningConfig { function_name } => Route::new(
                Method::DELETE,
                &[CODE_SIGNING, "functions", function_name, "code-signing-config"],
            ),
            Self::TagResource { resource_arn, tags } => {
                Route::new(Method::POST, &[TAGS, "tags", resource_arn])
                    .with_body(json!({ "Tags": tags }))
            },
            Self::UntagResource {
                resource_arn,
                tag_keys,
            } => tag_keys.iter().fold(
                Route::new(Method::DELETE, &[TAGS, "tags", resource_arn]),
                |route, key| route.with_query("tagKeys", key),
            ),
            Self::ListTags { resource_arn } => Route::new(Method::GET, &[TAGS, "tags", resource_arn]),
            Self::CreateAlias { function_name, body } => {
                Route::new(Method::POST, &[FUNCTIONS, "functions", function_name, "aliases"])
                    .with_body(body.clone())
            },
            Self::GetAlias {
                function_name,
                alias_name,
            } => Route::new(
                Method::GET,
                &[FUNCTIONS, "functions", function_name, "aliases", alias_name],
            ),
            Self::UpdateAlias {
                function_name,
                alias_name,
                body,
            } => Route::new(
                Method::PUT,
                &[FUNCTIONS, "functions", function_name, "aliases", alias_name],
            )
            .with_body(body.clone()),
            Self::DeleteAlias {
                function_name,
                alias_name,
            } => Route::new(
                Method::DELETE,
                &[FUNCTIONS, "functions", function_name, "aliases", alias_name],
            ),
            Self::PutProvisionedConcurrencyConfig {
                function_name,
                qualifier,
                provisioned_concurrent_executions,
            } => Route::new(
                Method::PUT,
                &[PROVISIONED, "functions", function_name, "provisioned-concurrency"],
            )
            .with_query("Qualifier", qualifier)
            .with_body(json!({ "ProvisionedConcurrentExecutions": provisioned_concurrent_executions })),
            Self::GetProvisionedConcurrencyConfig {
                function_name,
                qualifier,
            } => Route::new(
                Method::GET,
                &[PROVISIONED, "functions", function_name, "provisioned-concurrency"],
            )
            .with_query("Qualifier", qualifier),
            Self::DeleteProvisionedConcurrencyConfig {
                function_name,
                qualifier,
            } => Route::new(
                Method::DELETE,
                &[PROVISIONED, "functions", function_name, "provisioned-concurrency"],
            )
            .with_query("Qualifier", qualifier),
            Self::PublishLayerVersion { layer_name, body } => {
                Route::new(Method::POST, &[LAYERS, "layers", layer_name, "versions"])
                    .with_body(body.clone())
            },
            Self::GetLayerVersion {
                layer_name,
                version_number,
            } => Route::new(
                Method::GET,
                &[LAYERS, "layers", layer_name, "versions", &version_number.to_string()],
            ),
            Self::DeleteLayerVersion {
                layer_name,
                version_number,
            } => Route::new(
                Method::DELETE,
                &[LAYERS, "layers", layer_name, "versions", &version_number.to_string()],
            ),
            Self::CreateEventSourceMapping { body } => {
                let mut route = Route::new(Method::POST, &[FUNCTIONS, "event-source-mappings"]);
                route.path.push('/');
                route.with_body(body.clone())
            },
            Self::GetEventSourceMapping { uuid } => {
                Route::new(Method::GET, &[FUNCTIONS, "event-source-mappings", uuid])
            },
            Self::UpdateEventSourceMapping { uuid, body } => {
                Route::new(Method::PUT, &[FUNCTIONS, "event-source-mappings", uuid])
                    .with_body(body.clone())
            },
            Self::DeleteEventSourceMapping { uuid } => {
                Route::new(Method::DELETE, &[FUNCTIONS, "event-source-mappings", uuid])
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_routes() {
        let route = LambdaRequest::GetFunction {
            function_name: "orders".to_string(),
        }
        .route();
        assert_eq!(route.method, Method::GET);
        assert_eq!(route.path, "/2015-03-31/functions/orders");
        assert!(route.body.is_none());
    }

    #[test]
    fn test_arn_path_segment_is_encoded() {
        let route = LambdaRequest::ListTags {
            resource_arn: "arn:aws:lambda:us-east-1:123456789012:function:orders".to_string(),
        }
        .route();
        assert_eq!(
            route.path,
            "/2017-03-31/tags/arn%3Aaws%3Alambda%3Aus-east-1%3A123456789012%3Afunction%3Aorders"
        );
    }

    #[test]
    fn test_untag_keys_become_query() {
        let route = LambdaRequest::UntagResource {
            resource_arn: "arn".to_string(),
            tag_keys: vec!["env".to_string(), "team".to_string()],
        }
        .route();
        assert_eq!(route.method, Method::DELETE);
        assert_eq!(
            route.query,
            vec![
                ("tagKeys".to_string(), "env".to_string()),
                ("tagKeys".to_string(), "team".to_string())
            ]
        );
    }

    #[test]
    fn test_provisioned_concurrency_route() {
        let route = LambdaRequest::PutProvisionedConcurrencyConfig {
            function_name: "orders".to_string(),
            qualifier: "live".to_string(),
            provisioned_concurrent_executions: 5,
        }
        .route();
        assert_eq!(route.path, "/2019-09-30/functions/orders/provisioned-concurrency");
        assert_eq!(route.query, vec![("Qualifier".to_string(), "live".to_string())]);
        assert_eq!(route.body, Some(json!({"ProvisionedConcurrentExecutions": 5})));
    }

    #[test]
    fn test_create_event_source_mapping_keeps_trailing_slash() {
        let route = LambdaRequest::CreateEventSourceMapping { body: json!({}) }.route();
        assert_eq!(route.path, "/2015-03-31/event-source-mappings/");
        assert_eq!(
            LambdaRequest::CreateEventSourceMapping { body: json!({}) }.operation(),
            "CreateEventSourceMapping"
        );
    }
}
