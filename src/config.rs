//! Session configuration

use crate::{SeError, SeResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables for an open session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Largest payload requested from the device in one random-byte frame
    pub max_transfer_len: usize,

    /// Log every command name and frame length at debug level
    pub log_frames: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            max_transfer_len: 512,
            log_frames: false,
        }
    }
}

impl SessionConfig {
    /// Parse from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> SeResult<Self> {
        let config: SessionConfig =
            serde_json::from_str(json).map_err(|e| SeError::InvalidArgument(format!("config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> SeResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    fn validate(&self) -> SeResult<()> {
        if self.max_transfer_len == 0 {
            return Err(SeError::InvalidArgument(
                "config: max_transfer_len must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
