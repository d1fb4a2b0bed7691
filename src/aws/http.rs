//! HTTP utilities for Lambda REST API calls

use super::api::ApiError;
use crate::error::ProviderError;
use anyhow::Context;
use reqwest::{Client, Method};
use serde_json::Value;
use url::Url;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Header carrying the structured error code on failed calls
const ERROR_TYPE_HEADER: &str = "x-amzn-errortype";

/// Sanitize response body for logging
/// Truncates long responses and strips non-printable characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = (0..=MAX_LOG_BODY_LENGTH)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Extract the error code from the error-type header or the JSON body.
///
/// The header looks like `ResourceNotFoundException:http://internal.amazon.com/...`;
/// bodies may carry `__type` (sometimes namespaced with `#`), `code` or `Code`.
fn error_code(header: Option<&str>, body: &Value) -> Option<String> {
    if let Some(header) = header {
        let code = header.split(':').next().unwrap_or(header).trim();
        if !code.is_empty() {
            return Some(code.to_string());
        }
    }

    ["__type", "code", "Code"]
        .iter()
        .find_map(|key| body.get(*key).and_then(|v| v.as_str()))
        .map(|t| t.rsplit('#').next().unwrap_or(t).to_string())
}

fn error_message(body: &Value) -> String {
    ["message", "Message", "errorMessage"]
        .iter()
        .find_map(|key| body.get(*key).and_then(|v| v.as_str()))
        .unwrap_or("no error message")
        .to_string()
}

/// HTTP client wrapper for Lambda API calls
#[derive(Clone)]
pub struct LambdaHttpClient {
    client: Client,
}

impl LambdaHttpClient {
    /// Create a new HTTP client
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(format!("lambda-provider/{}", crate::VERSION))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Send a signed request and decode the JSON answer.
    ///
    /// Empty success bodies decode to `Value::Null`.
    pub async fn send(
        &self,
        method: Method,
        url: Url,
        headers: &[(String, String)],
        payload: Vec<u8>,
    ) -> Result<Value, ApiError> {
        tracing::debug!("{} {}", method, url);

        let mut request = self.client.request(method, url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if !payload.is_empty() {
            request = request
                .header("content-type", "application/json")
                .body(payload);
        }

        let response = request.send().await?;
        let status = response.status();
        let error_type = response
            .headers()
            .get(ERROR_TYPE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response.text().await?;

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            let parsed: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
            let code = error_code(error_type.as_deref(), &parsed)
                .unwrap_or_else(|| "UnknownError".to_string());
            return Err(ApiError::Service {
                status: status.as_u16(),
                code,
                message: error_message(&parsed),
            });
        }

        // Handle empty response
        if body.is_empty() {
            return Ok(Value::Null);
        }

        Ok(serde_json::from_str(&body)?)
    }
}

/// Format a provider error for display.
/// Security: remote errors are summarised by their code, never echoed raw
pub fn format_api_error(error: &ProviderError) -> String {
    let source = match error {
        ProviderError::Api { source, .. } => Some(source),
        ProviderError::PartialSave { source, .. } => match source.as_ref() {
            ProviderError::Api { source, .. } => Some(source),
            _ => None,
        },
        _ => None,
    };

    let Some(source) = source else {
        return error.to_string();
    };

    match source.code() {
        Some("ResourceNotFoundException") => "Resource not found.".to_string(),
        Some("AccessDeniedException") | Some("UnrecognizedClientException") => {
            "Permission denied. Check your IAM permissions.".to_string()
        },
        Some("InvalidSignatureException") => {
            "Request signature rejected. Check your AWS credentials and clock.".to_string()
        },
        Some("TooManyRequestsException") => "Rate limit exceeded. Please try again later.".to_string(),
        Some("ResourceConflictException") => {
            "Resource conflict. The resource may already exist or be mid-update.".to_string()
        },
        Some("InvalidParameterValueException") => {
            "Invalid request. Check your resource specification.".to_string()
        },
        Some("ServiceException") => {
            "Lambda service temporarily unavailable. Please try again.".to_string()
        },
        Some(code) => format!("{} ({})", error, code),
        None => "Request failed. Check your network connection and try again.".to_string(),
    }
}
