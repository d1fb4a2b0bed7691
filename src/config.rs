//! Configuration Management
//!
//! Handles persistent configuration storage for lambda-provider. Stored
//! values override the AWS default chain, which resolves anything left unset.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    /// Region for remote calls
    #[serde(default)]
    pub region: Option<String>,
    /// Shared credentials profile
    #[serde(default)]
    pub profile: Option<String>,
    /// Endpoint override (local emulators)
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl ProviderConfig {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("lambda-provider").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };

        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    /// Apply command-line overrides on top of the stored values
    pub fn with_overrides(
        mut self,
        region: Option<String>,
        profile: Option<String>,
        endpoint: Option<String>,
    ) -> Self {
        if region.is_some() {
            self.region = region;
        }
        if profile.is_some() {
            self.profile = profile;
        }
        if endpoint.is_some() {
            self.endpoint = endpoint;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_take_precedence() {
        let stored = ProviderConfig {
            region: Some("eu-west-1".to_string()),
            profile: Some("ci".to_string()),
            endpoint: None,
        };
        let config = stored.with_overrides(
            Some("us-east-2".to_string()),
            None,
            Some("http://localhost:4566".to_string()),
        );
        assert_eq!(config.region.as_deref(), Some("us-east-2"));
        assert_eq!(config.profile.as_deref(), Some("ci"));
        assert_eq!(config.endpoint.as_deref(), Some("http://localhost:4566"));
    }

    #[test]
    fn test_config_deserializes_partial_documents() {
        let config: ProviderConfig = serde_json::from_str(r#"{"region": "ap-south-1"}"#).unwrap();
        assert_eq!(config.region.as_deref(), Some("ap-south-1"));
        assert!(config.profile.is_none());
    }
}
