//! Execution configuration
//!
//! Knobs for deadlines, the converter pool and sort strategy. Loaded from a
//! JSON file or string; every field has a default.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::observability::Event;

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration is not valid JSON for this structure
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range
    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Execution configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Per-query deadline in milliseconds (default: none)
    #[serde(default)]
    pub query_timeout_ms: Option<u64>,

    /// Maximum idle row converters kept by the pool (default: 8)
    #[serde(default = "default_converter_pool_capacity")]
    pub converter_pool_capacity: usize,

    /// Scratch buffer size of each row converter (default: 1 MiB)
    #[serde(default = "default_converter_buffer_bytes")]
    pub converter_buffer_bytes: usize,

    /// Sorts with a limit at or below this keep only the best rows (default: 1024)
    #[serde(default = "default_sort_limit_threshold")]
    pub sort_limit_threshold: usize,
}

fn default_converter_pool_capacity() -> usize {
    8
}

fn default_converter_buffer_bytes() -> usize {
    1024 * 1024
}

fn default_sort_limit_threshold() -> usize {
    1024
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            query_timeout_ms: None,
            converter_pool_capacity: default_converter_pool_capacity(),
            converter_buffer_bytes: default_converter_buffer_bytes(),
            sort_limit_threshold: default_sort_limit_threshold(),
        }
    }
}

impl ExecutionConfig {
    /// Create a config with a query deadline
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            query_timeout_ms: Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)),
            ..Default::default()
        }
    }

    /// Query deadline, if any
    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_ms.map(Duration::from_millis)
    }

    /// Parse and validate a JSON config
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_json_str(&json)?;
        info!(
            event = Event::ConfigLoaded.as_str(),
            path = %path.display(),
            "execution config loaded"
        );
        Ok(config)
    }

    /// Rejects values the pool cannot work with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.converter_pool_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "converter_pool_capacity",
                reason: "must be at least 1".into(),
            });
        }
        if self.converter_buffer_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "converter_buffer_bytes",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}
