//! Resource Registry - Resource type catalogue
//!
//! The set of resource types is closed: [`ResourceKind`] names each one.
//! Per-type metadata (display name, identifier and computed fields) is
//! loaded from an embedded JSON file on first access.

use crate::error::ProviderError;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Embedded resource JSON (compiled into the binary)
const RESOURCE_FILE: &str = include_str!("../resources/lambda.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Function,
    Alias,
    LayerVersion,
    EventSourceMapping,
}

impl ResourceKind {
    pub fn all() -> &'static [ResourceKind] {
        &[
            Self::Function,
            Self::Alias,
            Self::LayerVersion,
            Self::EventSourceMapping,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "aws/lambda/function",
            Self::Alias => "aws/lambda/alias",
            Self::LayerVersion => "aws/lambda/layerVersion",
            Self::EventSourceMapping => "aws/lambda/eventSourceMapping",
        }
    }

    /// Registry entry for this type
    pub fn definition(&self) -> Result<&'static ResourceDef, ProviderError> {
        get_resource(self.as_str()).ok_or_else(|| {
            ProviderError::invariant(format!("no registry entry for {}", self.as_str()))
        })
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ProviderError::UnknownResourceType(s.to_string()))
    }
}

/// Resource definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceDef {
    pub display_name: String,
    /// Spec path holding the durable remote identifier
    pub id_field: String,
    /// Spec paths whose values are assigned by the remote API
    #[serde(default)]
    pub computed_fields: Vec<String>,
}

/// Root structure of resources/lambda.json
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub resources: HashMap<String, ResourceDef>,
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<ResourceConfig> = OnceLock::new();

/// Get the resource registry (loads from embedded JSON on first access)
pub fn get_registry() -> &'static ResourceConfig {
    REGISTRY.get_or_init(|| {
        serde_json::from_str(RESOURCE_FILE)
            .unwrap_or_else(|e| panic!("Failed to parse embedded resource JSON: {}", e))
    })
}

/// Get a resource definition by type name
pub fn get_resource(key: &str) -> Option<&'static ResourceDef> {
    get_registry().resources.get(key)
}
