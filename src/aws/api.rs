//! Remote API seam
//!
//! [`LambdaApi`] is the one trait the resource code talks to. The HTTP
//! implementation lives in [`super::client`]; tests substitute recording
//! fakes.

use super::auth::AuthError;
use super::request::LambdaRequest;
use crate::error::ProviderError;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Error code the Lambda API uses for missing resources
pub const RESOURCE_NOT_FOUND: &str = "ResourceNotFoundException";

#[derive(Debug, Error)]
pub enum ApiError {
    /// The service answered with an error document
    #[error("{code} ({status}): {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl ApiError {
    pub fn service(status: u16, code: &str, message: &str) -> Self {
        Self::Service {
            status,
            code: code.to_string(),
            message: message.to_string(),
        }
    }

    /// Structured error code, when the service supplied one
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Service { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Service { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Classified by error code only, never by message text
    pub fn is_not_found(&self) -> bool {
        self.code() == Some(RESOURCE_NOT_FOUND)
    }
}

#[async_trait]
pub trait LambdaApi: Send + Sync {
    async fn send(&self, request: LambdaRequest) -> Result<Value, ApiError>;
}

/// A remote API handle bound to the caller's cancellation token
#[derive(Clone, Copy)]
pub struct RemoteCall<'a> {
    api: &'a dyn LambdaApi,
    cancel: &'a CancellationToken,
}

impl<'a> RemoteCall<'a> {
    pub fn new(api: &'a dyn LambdaApi, cancel: &'a CancellationToken) -> Self {
        Self { api, cancel }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Send one request, racing it against cancellation.
    ///
    /// Errors are wrapped with the request's operation name.
    pub async fn send(&self, request: LambdaRequest) -> Result<Value, ProviderError> {
        let operation = request.operation();
        if self.cancel.is_cancelled() {
            return Err(ProviderError::Cancelled { operation });
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                tracing::warn!("{} cancelled by caller", operation);
                Err(ProviderError::Cancelled { operation })
            },
            result = self.api.send(request) => {
                result.map_err(|source| ProviderError::api(operation, source))
            },
        }
    }

    /// Like [`send`](Self::send) but maps a not-found answer to `None`
    pub async fn send_optional(&self, request: LambdaRequest) -> Result<Option<Value>, ProviderError> {
        match self.send(request).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}
