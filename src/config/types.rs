//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use super::defaults::default_server_name;
use super::limits::{LimitsConfig, RoomsConfig};
use super::listen::ListenConfig;
use super::store::StoreConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server information.
    #[serde(default)]
    pub server: ServerConfig,
    /// Network listen configuration.
    pub listen: ListenConfig,
    /// Credential store configuration.
    pub store: StoreConfig,
    /// Room lifecycle configuration.
    #[serde(default)]
    pub rooms: RoomsConfig,
    /// Per-connection limits.
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Server identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Name used in logs (default: "chatroomd").
    #[serde(default = "default_server_name")]
    pub name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
        }
    }
}
