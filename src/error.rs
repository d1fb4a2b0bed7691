//! Provider errors
//!
//! Every lifecycle call returns [`ProviderError`]. The variants follow the
//! failure categories a host needs to tell apart when logging or deciding
//! whether to retry: configuration, remote API, missing preconditions,
//! partially applied saves and wiring defects.

use crate::aws::api::ApiError;
use crate::spec::path::PathError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// No usable remote client could be resolved (region, credentials, endpoint)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A remote call failed; carries the remote operation name
    #[error("{operation} failed: {source}")]
    Api {
        operation: &'static str,
        #[source]
        source: ApiError,
    },

    /// The remote API answered with a shape we can not use
    #[error("Unexpected {operation} response: {message}")]
    UnexpectedResponse {
        operation: &'static str,
        message: String,
    },

    #[error("Missing required field {path} for {resource_type}")]
    MissingField {
        resource_type: &'static str,
        path: String,
    },

    #[error("Invalid value at {path}: {message}")]
    InvalidValue { path: String, message: String },

    #[error("Invalid field path: {0}")]
    InvalidPath(#[from] PathError),

    /// A save step failed after zero or more earlier steps were applied remotely
    #[error(
        "{resource}: save step {step} failed after completing [{done}]: {source}",
        done = .completed.join(", ")
    )]
    PartialSave {
        resource: String,
        step: &'static str,
        completed: Vec<&'static str>,
        #[source]
        source: Box<ProviderError>,
    },

    /// The remote resource reached a terminal failure state
    #[error("{resource_type} {resource_id} failed: {reason}")]
    ResourceFailed {
        resource_type: &'static str,
        resource_id: String,
        reason: String,
    },

    /// Step wiring defect, never caused by the environment
    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("{operation} cancelled")]
    Cancelled { operation: &'static str },

    #[error("Unknown resource type: {0}")]
    UnknownResourceType(String),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProviderError {
    /// Wrap a remote API error with the operation that produced it
    pub fn api(operation: &'static str, source: ApiError) -> Self {
        Self::Api { operation, source }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn missing_field(resource_type: &'static str, path: impl Into<String>) -> Self {
        Self::MissingField {
            resource_type,
            path: path.into(),
        }
    }

    pub fn invalid_value(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn unexpected_response(operation: &'static str, message: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            operation,
            message: message.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant(message.into())
    }

    /// True when the remote API classified the error as "resource not found".
    ///
    /// Only the structured error code is consulted.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Api { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Structured remote error code, if this is a remote API error
    pub fn api_code(&self) -> Option<&str> {
        match self {
            Self::Api { source, .. } => source.code(),
            _ => None,
        }
    }

    /// True for defects in step wiring rather than runtime conditions
    pub fn is_invariant_violation(&self) -> bool {
        match self {
            Self::Invariant(_) => true,
            Self::PartialSave { source, .. } => source.is_invariant_violation(),
            _ => false,
        }
    }

    /// Short category label used in logs
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "configuration",
            Self::Api { .. } | Self::UnexpectedResponse { .. } | Self::ResourceFailed { .. } => {
                "remote"
            },
            Self::MissingField { .. } | Self::InvalidValue { .. } | Self::InvalidPath(_) => {
                "precondition"
            },
            Self::PartialSave { .. } => "partial-save",
            Self::Invariant(_) => "invariant",
            Self::Cancelled { .. } => "cancelled",
            Self::UnknownResourceType(_) => "dispatch",
            Self::Serialization(_) => "serialization",
        }
    }
}

pub type Result<T, E = ProviderError> = std::result::Result<T, E>;
