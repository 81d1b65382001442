//! Engine configuration
//!
//! `EngineConfig` is built once by the host (defaults, optionally overridden by
//! environment variables) and handed to `HierarchyService`. It is immutable for
//! the lifetime of the service.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hard ceiling for `max_depth`
pub const MAX_SUPPORTED_DEPTH: usize = 1024;

pub const ENV_MAX_DEPTH: &str = "OBJECTSPACE_MAX_DEPTH";
pub const ENV_UNKNOWN_OWNER: &str = "OBJECTSPACE_UNKNOWN_OWNER";
pub const ENV_DEGRADE_MISSING_LINKS: &str = "OBJECTSPACE_DEGRADE_MISSING_LINKS";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for hierarchy building
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Levels below the requested root the merger expands before truncating
    pub max_depth: usize,

    /// Owner display name used when no profile exists
    pub unknown_owner_label: String,

    /// Treat an unprovisioned link relation as "no links" instead of failing
    pub degrade_missing_links: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: 64,
            unknown_owner_label: "unknown".to_string(),
            degrade_missing_links: true,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `OBJECTSPACE_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each known key
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_MAX_DEPTH) {
            config.max_depth = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_MAX_DEPTH.to_string(),
                value: raw.clone(),
            })?;
        }
        if let Some(label) = lookup(ENV_UNKNOWN_OWNER) {
            config.unknown_owner_label = label;
        }
        if let Some(raw) = lookup(ENV_DEGRADE_MISSING_LINKS) {
            config.degrade_missing_links = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: ENV_DEGRADE_MISSING_LINKS.to_string(),
                        value: raw,
                    })
                }
            };
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::Invalid(
                "max_depth must be greater than 0".to_string(),
            ));
        }

        if self.max_depth > MAX_SUPPORTED_DEPTH {
            return Err(ConfigError::Invalid(format!(
                "max_depth cannot exceed {}",
                MAX_SUPPORTED_DEPTH
            )));
        }

        if self.unknown_owner_label.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "unknown_owner_label cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
