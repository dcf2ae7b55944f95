//! Credential store configuration.

use super::defaults::{
    default_busy_timeout_ms, default_hash_iterations, default_hash_memory_kib,
    default_hash_parallelism, default_pool_size,
};
use serde::Deserialize;

/// Credential store (SQLite) configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// SQLite connection string: `sqlite://path/to/chat.db`, a plain path,
    /// or `:memory:` for a process-local database.
    pub url: String,
    /// Number of connections opened at startup (default: 4).
    /// Also the upper bound on concurrent store queries.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// How long a connection waits on a locked database file (default: 5000).
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Argon2id parameters for newly registered passwords.
    #[serde(default)]
    pub password_hashing: PasswordHashingConfig,
}

/// Argon2id cost parameters.
///
/// Only affects hashes created from now on; stored hashes carry their own
/// parameters and keep verifying after a change.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordHashingConfig {
    #[serde(default = "default_hash_memory_kib")]
    pub memory_kib: u32,
    #[serde(default = "default_hash_iterations")]
    pub iterations: u32,
    #[serde(default = "default_hash_parallelism")]
    pub parallelism: u32,
}

impl Default for PasswordHashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_hash_memory_kib(),
            iterations: default_hash_iterations(),
            parallelism: default_hash_parallelism(),
        }
    }
}
