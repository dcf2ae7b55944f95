//! Credential store.
//!
//! Provides access to the SQLite user table through a fixed-size pool of
//! connections opened at startup:
//! - [`pool`]: the bounded pool and its checkout guard
//! - [`statements`]: the named operations prepared on every connection
//! - [`credentials`]: the store itself (connect, execute, register, authenticate)

mod credentials;
mod pool;
mod statements;

pub use credentials::{CredentialStore, RegisterOutcome, UserRecord};
pub use pool::{Pool, PoolError, Pooled};
pub use statements::Statement;

use thiserror::Error;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error("password hashing error: {0}")]
    PasswordHash(String),
    #[error("{statement} takes {expected} argument(s), got {actual}")]
    Arity {
        statement: Statement,
        expected: usize,
        actual: usize,
    },
}

impl DbError {
    /// Whether this error is a UNIQUE constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::Sqlx(sqlx::Error::Database(e)) if e.is_unique_violation())
    }
}
