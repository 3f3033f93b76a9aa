// Server configuration.
//
// `ServerConfig` is read from an optional JSON file (`--config`) and then
// overridden by command-line values in `main.rs`. Every field has a default,
// so an empty object `{}` (or no file at all) gives the standard server:
// port 3999 on all interfaces, 1 s message timeout, 5 s while recharging,
// and the reference key table.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::keys::KeyTable;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Per-message read timeout in milliseconds.
    pub timeout_ms: u64,
    /// Read timeout while the robot is recharging.
    pub recharge_timeout_ms: u64,
    pub keys: KeyTable,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".into(),
            port: 3999,
            timeout_ms: 1000,
            recharge_timeout_ms: 5000,
            keys: KeyTable::reference(),
        }
    }
}

/// Read deadlines for one connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timeouts {
    pub normal: Duration,
    pub recharging: Duration,
}

impl ServerConfig {
    /// Load and validate a JSON config file. Missing fields take defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeout_ms must be > 0"));
        }
        if self.recharge_timeout_ms == 0 {
            return Err(ConfigError::Invalid("recharge_timeout_ms must be > 0"));
        }
        if self.keys.is_empty() {
            return Err(ConfigError::Invalid("keys must not be empty"));
        }
        Ok(())
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            normal: Duration::from_millis(self.timeout_ms),
            recharging: Duration::from_millis(self.recharge_timeout_ms),
        }
    }
}
