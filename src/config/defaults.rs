//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

// =============================================================================
// Server Defaults
// =============================================================================

pub fn default_server_name() -> String {
    "chatroomd".to_string()
}

// =============================================================================
// Store Defaults
// =============================================================================

pub fn default_pool_size() -> usize {
    4
}

pub fn default_busy_timeout_ms() -> u64 {
    5_000
}

pub fn default_hash_memory_kib() -> u32 {
    argon2::Params::DEFAULT_M_COST
}

pub fn default_hash_iterations() -> u32 {
    argon2::Params::DEFAULT_T_COST
}

pub fn default_hash_parallelism() -> u32 {
    argon2::Params::DEFAULT_P_COST
}

// =============================================================================
// Limits Defaults
// =============================================================================

pub fn default_max_line_length() -> usize {
    4096
}

pub fn default_sendq() -> usize {
    1024
}

pub fn default_shutdown_flush_ms() -> u64 {
    500
}
