//! Lambda Client
//!
//! Main client for the Lambda REST API, combining credentials, request
//! signing and HTTP functionality.

use super::api::{ApiError, LambdaApi};
use super::auth::{self, CredentialSource, SigningRequest};
use super::http::LambdaHttpClient;
use super::request::{LambdaRequest, Route};
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::SystemTime;
use url::Url;

/// Main Lambda client
#[derive(Clone)]
pub struct LambdaClient {
    pub credentials: Arc<CredentialSource>,
    pub http: LambdaHttpClient,
    pub region: String,
    endpoint: Url,
}

impl LambdaClient {
    /// Create a new client; `endpoint` overrides the regional service URL
    pub fn new(
        region: &str,
        credentials: CredentialSource,
        endpoint: Option<&str>,
    ) -> Result<Self, ProviderError> {
        if !auth::validate_region(region) {
            return Err(ProviderError::config(format!("invalid region '{}'", region)));
        }

        let endpoint = match endpoint {
            Some(url) => url.to_string(),
            None => format!("https://lambda.{}.amazonaws.com", region),
        };
        let endpoint = Url::parse(&endpoint)
            .map_err(|e| ProviderError::config(format!("invalid endpoint '{}': {}", endpoint, e)))?;

        let http = LambdaHttpClient::new().map_err(|e| ProviderError::config(e.to_string()))?;

        Ok(Self {
            credentials: Arc::new(credentials),
            http,
            region: region.to_string(),
            endpoint,
        })
    }

    /// Build a client from the stored configuration and the AWS default chain
    pub async fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let sdk_config =
            auth::load_sdk_config(config.profile.as_deref(), config.region.as_deref()).await;

        let region = sdk_config
            .region()
            .map(|r| r.as_ref().to_string())
            .ok_or_else(|| {
                ProviderError::config(
                    "no region configured; set --region, AWS_REGION or a profile region",
                )
            })?;
        let credentials = CredentialSource::from_sdk_config(&sdk_config)?;
        // AWS_ENDPOINT_URL and profile endpoint_url apply when no override is given
        let endpoint = config.endpoint.as_deref().or(sdk_config.endpoint_url());

        tracing::info!(
            "Using region {} with profile {}",
            region,
            config.profile.as_deref().unwrap_or("<default chain>")
        );
        Self::new(&region, credentials, endpoint)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Absolute URL of a route on this client's endpoint
    fn url(&self, route: &Route) -> Url {
        let mut url = self.endpoint.clone();
        url.set_path(&route.path);
        if !route.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&route.query);
        }
        url
    }
}

#[async_trait]
impl LambdaApi for LambdaClient {
    async fn send(&self, request: LambdaRequest) -> Result<Value, ApiError> {
        let route = request.route();
        let payload = match &route.body {
            Some(body) => serde_json::to_vec(body)?,
            None => Vec::new(),
        };
        let url = self.url(&route);

        let credentials = self.credentials.credentials().await?;
        let headers = auth::sign_request(
            &credentials,
            &self.region,
            &SigningRequest {
                method: route.method.as_str(),
                url: url.as_str(),
                payload: &payload,
            },
            SystemTime::now(),
        )?;

        tracing::debug!("Calling {}", request.operation());
        self.http.send(route.method, url, &headers, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_credential_types::Credentials;

    fn credentials() -> CredentialSource {
        CredentialSource::new(Credentials::new("AKIDEXAMPLE", "secret", None, None, "test"))
    }

    #[test]
    fn test_default_endpoint_is_regional() {
        let client = LambdaClient::new("eu-west-1", credentials(), None).unwrap();
        assert_eq!(
            client.endpoint().as_str(),
            "https://lambda.eu-west-1.amazonaws.com/"
        );
    }

    #[test]
    fn test_route_url_keeps_port_and_query() {
        let client =
            LambdaClient::new("us-east-1", credentials(), Some("http://127.0.0.1:4566")).unwrap();
        let route = LambdaRequest::GetProvisionedConcurrencyConfig {
            function_name: "orders".to_string(),
            qualifier: "live".to_string(),
        }
        .route();
        let url = client.url(&route);
        assert_eq!(url.port(), Some(4566));
        assert_eq!(url.query(), Some("Qualifier=live"));
        assert!(url.path().ends_with("/functions/orders/provisioned-concurrency"));
    }

    #[test]
    fn test_invalid_region_rejected() {
        let err = LambdaClient::new("not a region", credentials(), None).err().unwrap();
        assert!(matches!(err, ProviderError::Config(_)));
    }
}
