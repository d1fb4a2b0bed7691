//! AWS Authentication
//!
//! Credential and region resolution go through `aws-config`'s default
//! chain: environment, shared config and credentials profiles,
//! `credential_process`, SSO, web identity and instance metadata. Requests
//! are signed with Signature Version 4 via `aws-sigv4`.

use crate::error::ProviderError;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::provider::error::CredentialsError;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_credential_types::Credentials;
use aws_sigv4::http_request::{
    sign, SignableBody, SignableRequest, SigningParams, SigningSettings,
};
use aws_sigv4::sign::v4;
use aws_smithy_runtime_api::client::identity::Identity;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::sync::Mutex;

/// Signing name of the Lambda service
pub const SERVICE: &str = "lambda";

/// Cached credentials are refreshed this long before they expire
const REFRESH_WINDOW: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to resolve AWS credentials: {0}")]
    Credentials(#[from] CredentialsError),

    #[error("failed to sign request: {0}")]
    Signing(String),
}

/// Load the shared AWS configuration; explicit values win over the chain
pub async fn load_sdk_config(profile: Option<&str>, region: Option<&str>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(profile) = profile {
        loader = loader.profile_name(profile);
    }
    if let Some(region) = region {
        loader = loader.region(Region::new(region.to_string()));
    }
    loader.load().await
}

/// Validate a region name: lowercase letters, digits and hyphens,
/// starting with a letter and not ending with a hyphen
pub fn validate_region(region: &str) -> bool {
    if region.is_empty() || region.len() > 32 || region.ends_with('-') {
        return false;
    }
    match region.chars().next() {
        Some(c) if c.is_ascii_lowercase() => {},
        _ => return false,
    }
    region
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// A credentials provider with a cache in front of it.
///
/// Providers such as `credential_process` or SSO are costly to query, so
/// credentials are reused until they come within [`REFRESH_WINDOW`] of
/// expiring.
pub struct CredentialSource {
    provider: SharedCredentialsProvider,
    cached: Mutex<Option<Credentials>>,
}

impl CredentialSource {
    pub fn new(provider: impl ProvideCredentials + 'static) -> Self {
        Self {
            provider: SharedCredentialsProvider::new(provider),
            cached: Mutex::new(None),
        }
    }

    /// Use the provider chain resolved by [`load_sdk_config`]
    pub fn from_sdk_config(config: &SdkConfig) -> Result<Self, ProviderError> {
        let provider = config
            .credentials_provider()
            .ok_or_else(|| ProviderError::config("no AWS credentials provider configured"))?;
        Ok(Self {
            provider,
            cached: Mutex::new(None),
        })
    }

    pub async fn credentials(&self) -> Result<Credentials, AuthError> {
        let mut cached = self.cached.lock().await;
        if let Some(credentials) = cached.as_ref() {
            if !expiring(credentials, SystemTime::now()) {
                return Ok(credentials.clone());
            }
            tracing::debug!("Cached AWS credentials expiring; refreshing");
        }

        let fresh = self.provider.provide_credentials().await?;
        tracing::debug!("Resolved AWS credentials");
        *cached = Some(fresh.clone());
        Ok(fresh)
    }
}

fn expiring(credentials: &Credentials, now: SystemTime) -> bool {
    credentials
        .expiry()
        .is_some_and(|expiry| expiry <= now + REFRESH_WINDOW)
}

/// The parts of a request covered by the signature
pub struct SigningRequest<'a> {
    pub method: &'a str,
    /// Full URL, path segments already percent-encoded once
    pub url: &'a str,
    pub payload: &'a [u8],
}

/// Sign a request, returning the headers to add to it
pub fn sign_request(
    credentials: &Credentials,
    region: &str,
    request: &SigningRequest<'_>,
    time: SystemTime,
) -> Result<Vec<(String, String)>, AuthError> {
    let identity: Identity = credentials.clone().into();
    let params: SigningParams<'_> = v4::SigningParams::builder()
        .identity(&identity)
        .region(region)
        .name(SERVICE)
        .time(time)
        .settings(SigningSettings::default())
        .build()
        .map_err(|e| AuthError::Signing(e.to_string()))?
        .into();

    let signable = SignableRequest::new(
        request.method,
        request.url,
        std::iter::empty(),
        SignableBody::Bytes(request.payload),
    )
    .map_err(|e| AuthError::Signing(e.to_string()))?;

    let (instructions, _signature) = sign(signable, &params)
        .map_err(|e| AuthError::Signing(e.to_string()))?
        .into_parts();

    Ok(instructions
        .headers()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_credential_types::provider::future;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    // 2024-05-01T12:00:00Z
    fn signing_time() -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_714_564_800)
    }

    fn static_credentials(expiry: Option<SystemTime>) -> Credentials {
        Credentials::new("AKIDEXAMPLE", "secret", Some("token".to_string()), expiry, "test")
    }

    #[derive(Debug)]
    struct Counting {
        calls: Arc<AtomicUsize>,
        expiry: Option<SystemTime>,
    }

    impl ProvideCredentials for Counting {
        fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
        where
            Self: 'a,
        {
            self.calls.fetch_add(1, Ordering::SeqCst);
            future::ProvideCredentials::ready(Ok(static_credentials(self.expiry)))
        }
    }

    #[test]
    fn test_sign_produces_authorization_header() {
        let request = SigningRequest {
            method: "GET",
            url: "https://lambda.eu-west-1.amazonaws.com/2015-03-31/functions/orders",
            payload: b"",
        };
        let headers = sign_request(&static_credentials(None), "eu-west-1", &request, signing_time()).unwrap();

        let get = |name: &str| {
            headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(get("x-amz-date"), "20240501T120000Z");
        assert_eq!(get("x-amz-security-token"), "token");
        assert!(get("authorization").starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240501/eu-west-1/lambda/aws4_request"
        ));

        let again = sign_request(&static_credentials(None), "eu-west-1", &request, signing_time()).unwrap();
        assert_eq!(headers, again);
    }

    #[tokio::test]
    async fn test_credentials_are_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = CredentialSource::new(Counting {
            calls: calls.clone(),
            expiry: None,
        });
        source.credentials().await.unwrap();
        source.credentials().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expiring_credentials_are_refreshed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = CredentialSource::new(Counting {
            calls: calls.clone(),
            expiry: Some(SystemTime::now() + Duration::from_secs(60)),
        });
        source.credentials().await.unwrap();
        source.credentials().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_validate_region() {
        assert!(validate_region("us-east-1"));
        assert!(!validate_region("US-EAST-1"));
        assert!(!validate_region("us-east-"));
        assert!(!validate_region("1us"));
    }
}
