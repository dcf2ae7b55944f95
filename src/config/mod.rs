//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Top-level config struct and loading (Config, ServerConfig)
//! - [`listen`]: Network listener configuration (ListenConfig)
//! - [`store`]: Credential store configuration (StoreConfig, PasswordHashingConfig)
//! - [`limits`]: Room and connection limits (RoomsConfig, LimitsConfig)
//! - [`validation`]: Startup validation of a loaded config

mod defaults;
mod limits;
mod listen;
mod store;
mod types;
mod validation;

pub use limits::{LimitsConfig, RoomsConfig};
pub use listen::ListenConfig;
pub use store::{PasswordHashingConfig, StoreConfig};
pub use types::{Config, ConfigError, ServerConfig};
pub use validation::{ValidationError, validate};
