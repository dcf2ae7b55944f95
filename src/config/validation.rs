//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use std::path::Path;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.name is required")]
    MissingServerName,
    #[error("store.url is required")]
    MissingStoreUrl,
    #[error("store.pool_size must be at least 1")]
    EmptyPool,
    #[error("store.password_hashing is invalid: {0}")]
    InvalidHashing(String),
    #[error("store.url parent directory does not exist: {0}")]
    StorePathInvalid(String),
    #[error("limits.max_line_length must be at least 1")]
    ZeroLineLength,
    #[error("limits.sendq must be at least 1")]
    ZeroSendQ,
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.name.is_empty() {
        errors.push(ValidationError::MissingServerName);
    }

    let store = &config.store;
    if store.url.is_empty() {
        errors.push(ValidationError::MissingStoreUrl);
    } else if let Some(path) = file_path(&store.url)
        && let Some(parent) = Path::new(path).parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        errors.push(ValidationError::StorePathInvalid(store.url.clone()));
    }
    if store.pool_size == 0 {
        errors.push(ValidationError::EmptyPool);
    }

    let hashing = &store.password_hashing;
    if let Err(e) = argon2::Params::new(
        hashing.memory_kib,
        hashing.iterations,
        hashing.parallelism,
        None,
    ) {
        errors.push(ValidationError::InvalidHashing(e.to_string()));
    }

    if config.limits.max_line_length == 0 {
        errors.push(ValidationError::ZeroLineLength);
    }
    if config.limits.sendq == 0 {
        errors.push(ValidationError::ZeroSendQ);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Filesystem path of a SQLite URL, or `None` for in-memory databases.
fn file_path(url: &str) -> Option<&str> {
    let path = url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() || path == ":memory:" {
        None
    } else {
        Some(path)
    }
}
