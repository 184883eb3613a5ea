//! Engine configuration
//!
//! Loaded from an optional JSON file. Every field has a default, so an empty
//! object is a valid configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{ExecError, ExecResult};
use crate::observability::Severity;

/// Configuration shared by the pipeline and the executors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capacity of every port channel, in blocks
    #[serde(default = "default_port_capacity")]
    pub port_capacity: usize,

    /// Maximum rows per block emitted by materializing transforms
    #[serde(default = "default_max_block_rows")]
    pub max_block_rows: usize,

    /// Minimum severity written by the logger
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_port_capacity() -> usize {
    4
}
fn default_max_block_rows() -> usize {
    8192
}
fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            port_capacity: default_port_capacity(),
            max_block_rows: default_max_block_rows(),
            log_level: default_log_level(),
        }
    }
}

impl EngineConfig {
    /// Parses and validates a JSON configuration
    pub fn from_json_str(json: &str) -> ExecResult<Self> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| ExecError::invalid_config(format!("malformed config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file
    pub fn load(path: &Path) -> ExecResult<Self> {
        let json = fs::read_to_string(path).map_err(|e| {
            ExecError::invalid_config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    pub fn with_max_block_rows(mut self, rows: usize) -> Self {
        self.max_block_rows = rows;
        self
    }

    /// Rejects values the pipeline cannot run with
    pub fn validate(&self) -> ExecResult<()> {
        if self.port_capacity == 0 {
            return Err(ExecError::invalid_config("port_capacity must be at least 1"));
        }
        if self.max_block_rows == 0 {
            return Err(ExecError::invalid_config("max_block_rows must be at least 1"));
        }
        self.severity()?;
        Ok(())
    }

    /// Returns the configured log severity
    pub fn severity(&self) -> ExecResult<Severity> {
        Severity::parse(&self.log_level).ok_or_else(|| {
            ExecError::invalid_config(format!("unknown log_level '{}'", self.log_level))
        })
    }
}
