//! Room and connection limits configuration.

use super::defaults::{default_max_line_length, default_sendq, default_shutdown_flush_ms};
use serde::Deserialize;
use std::time::Duration;

/// Room lifecycle configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoomsConfig {
    /// Remove a room from the registry once its last member leaves
    /// (default: false, rooms live until shutdown).
    #[serde(default)]
    pub remove_when_empty: bool,
}

/// Per-connection limits.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Longest accepted line in bytes, excluding the delimiter (default: 4096).
    /// A longer line closes the connection.
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
    /// Lines a connection may have queued for sending (default: 1024).
    /// A member that falls this far behind is disconnected.
    #[serde(default = "default_sendq")]
    pub sendq: usize,
    /// Time allowed to flush queued output when a connection is closed
    /// (default: 500).
    #[serde(default = "default_shutdown_flush_ms")]
    pub shutdown_flush_ms: u64,
}

impl LimitsConfig {
    pub fn shutdown_flush(&self) -> Duration {
        Duration::from_millis(self.shutdown_flush_ms)
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_line_length: default_max_line_length(),
            sendq: default_sendq(),
            shutdown_flush_ms: default_shutdown_flush_ms(),
        }
    }
}
