//! Engine configuration.
//!
//! All structs deserialize from JSON with every field optional:
//!
//! ```json
//! { "cache": { "max_entries": 256 }, "resolver": { "max_chain_length": 64 } }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Error loading a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// The JSON did not match the expected shape.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    /// A value is out of range.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Configuration for the compiled-framework cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of compiled frameworks kept.
    pub max_entries: usize,
    /// Whether to enable the cache.
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1024,
            enabled: true,
        }
    }
}

impl CacheConfig {
    /// Compile on every call.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Enabled cache with the given capacity.
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            max_entries,
            enabled: true,
        }
    }
}

/// Configuration for the framework resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Upper bound on steps taken in each direction of a chain walk.
    pub max_chain_length: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_chain_length: 1024,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    /// Compiled-framework cache.
    pub cache: CacheConfig,
    /// Framework resolver.
    pub resolver: ResolverConfig,
}

impl GovernanceConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err(ConfigError::Invalid(
                "cache.max_entries must be positive when the cache is enabled".to_string(),
            ));
        }
        if self.resolver.max_chain_length == 0 {
            return Err(ConfigError::Invalid(
                "resolver.max_chain_length must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
