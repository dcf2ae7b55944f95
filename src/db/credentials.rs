//! SQLite-backed credential store.
//!
//! Owns the connection pool and implements the two named operations on top
//! of it. Each call to [`CredentialStore::execute_prepared`] checks out one
//! connection, runs one statement inside its own transaction, commits, and
//! returns the connection.
//!
//! Passwords are stored as Argon2id PHC strings. `authenticate_user` selects
//! the rows for a username; the password half of the match is a hash
//! verification against each returned row.
//!
//! Hashing and verification run on the blocking thread pool, at most
//! `pool_size` at a time, so sign-in bursts never occupy the runtime workers
//! that drive room fan-out.

use super::{DbError, Pool, PoolError, Statement};
use crate::config::{PasswordHashingConfig, StoreConfig};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteRow};
use sqlx::{Connection, Executor, Row, SqliteConnection};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// A row of the `users` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub username: String,
    pub password_hash: String,
}

/// Result of a registration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Created,
    AlreadyExists,
}

/// Pooled access to the user table.
pub struct CredentialStore {
    pool: Pool<SqliteConnection>,
    hasher: Argon2<'static>,
    dummy_hash: Arc<str>,
    hash_permits: Semaphore,
}

impl CredentialStore {
    /// Open `pool_size` connections, apply migrations, and prepare the named
    /// statements on each. Any failure aborts construction.
    pub async fn connect(config: &StoreConfig) -> Result<Self, DbError> {
        let options = connect_options(config)?;
        let hasher = argon2_hasher(&config.password_hashing)?;

        let mut connections = Vec::with_capacity(config.pool_size);
        for n in 0..config.pool_size {
            let mut conn = SqliteConnection::connect_with(&options).await?;
            if n == 0 {
                sqlx::migrate!("./migrations").run(&mut conn).await?;
                info!("Credential store migrations checked/applied");
            }
            for statement in Statement::ALL {
                conn.prepare(statement.sql()).await?;
            }
            connections.push(conn);
            debug!(connection = n + 1, "Credential store connection ready");
        }

        let dummy_hasher = hasher.clone();
        let dummy_hash =
            tokio::task::spawn_blocking(move || hash_with(&dummy_hasher, "chatroomd-timing-dummy"))
                .await
                .map_err(|e| DbError::PasswordHash(e.to_string()))??;

        info!(url = %config.url, pool_size = config.pool_size, "Credential store connected");
        Ok(Self {
            pool: Pool::new(connections),
            hasher,
            dummy_hash: Arc::from(dummy_hash),
            hash_permits: Semaphore::new(config.pool_size),
        })
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &Pool<SqliteConnection> {
        &self.pool
    }

    /// Run a named statement in its own committed transaction.
    ///
    /// The connection goes back to the pool on every path, including errors.
    pub async fn execute_prepared(
        &self,
        statement: Statement,
        args: &[&str],
    ) -> Result<Vec<SqliteRow>, DbError> {
        if args.len() != statement.arity() {
            return Err(DbError::Arity {
                statement,
                expected: statement.arity(),
                actual: args.len(),
            });
        }

        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let mut query = sqlx::query(statement.sql());
        for arg in args {
            query = query.bind(*arg);
        }
        let rows = query.fetch_all(&mut *tx).await?;
        tx.commit().await?;

        debug!(statement = %statement, rows = rows.len(), "Statement executed");
        Ok(rows)
    }

    /// Rows stored for `username` (zero or one, the name is the primary key).
    pub async fn find_user(&self, username: &str) -> Result<Vec<UserRecord>, DbError> {
        let rows = self
            .execute_prepared(Statement::AuthenticateUser, &[username])
            .await?;
        rows.iter()
            .map(|row| {
                Ok(UserRecord {
                    username: row.try_get("username")?,
                    password_hash: row.try_get("password_hash")?,
                })
            })
            .collect()
    }

    /// True when exactly one stored row matches `username` and `password`.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<bool, DbError> {
        let users = self.find_user(username).await?;
        let password = password.to_owned();

        if users.is_empty() {
            // Same Argon2 work as the existing-user path.
            let dummy = Arc::clone(&self.dummy_hash);
            self.hashing(move || verify_password(&password, &dummy))
                .await?;
            return Ok(false);
        }

        let hashes: Vec<String> = users.into_iter().map(|user| user.password_hash).collect();
        let matching = self
            .hashing(move || {
                hashes
                    .iter()
                    .filter(|hash| verify_password(&password, hash))
                    .count()
            })
            .await?;
        Ok(matching == 1)
    }

    /// Register `username`, unless a row for it already exists.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
    ) -> Result<RegisterOutcome, DbError> {
        if !self.find_user(username).await?.is_empty() {
            return Ok(RegisterOutcome::AlreadyExists);
        }

        let hasher = self.hasher.clone();
        let password = password.to_owned();
        let password_hash = self.hashing(move || hash_with(&hasher, &password)).await??;
        match self
            .execute_prepared(
                Statement::RegisterUser,
                &[username, password_hash.as_str()],
            )
            .await
        {
            Ok(_) => Ok(RegisterOutcome::Created),
            // A concurrent registration of the same name won the insert.
            Err(e) if e.is_unique_violation() => Ok(RegisterOutcome::AlreadyExists),
            Err(e) => Err(e),
        }
    }

    /// Run Argon2 work on the blocking pool, holding one hashing permit.
    async fn hashing<T, F>(&self, work: F) -> Result<T, DbError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let _permit = self
            .hash_permits
            .acquire()
            .await
            .map_err(|_| PoolError::Closed)?;
        tokio::task::spawn_blocking(work)
            .await
            .map_err(|e| DbError::PasswordHash(e.to_string()))
    }

    /// Close the pool and every idle connection.
    pub async fn close(&self) {
        self.hash_permits.close();
        let idle = self.pool.close();
        let count = idle.len();
        for conn in idle {
            if let Err(e) = conn.close().await {
                warn!(error = %e, "Failed to close store connection");
            }
        }
        info!(closed = count, "Credential store closed");
    }
}

fn connect_options(config: &StoreConfig) -> Result<SqliteConnectOptions, DbError> {
    let options = if is_memory(&config.url) {
        // sqlx names each `:memory:` options value uniquely and opens it with a
        // shared cache, so every pooled connection opened from it sees the same
        // database.
        SqliteConnectOptions::from_str("sqlite::memory:")?
    } else {
        SqliteConnectOptions::from_str(&config.url)?.journal_mode(SqliteJournalMode::Wal)
    };

    Ok(options
        .create_if_missing(true)
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms)))
}

fn is_memory(url: &str) -> bool {
    matches!(url, ":memory:" | "sqlite::memory:" | "sqlite://:memory:")
}

fn argon2_hasher(config: &PasswordHashingConfig) -> Result<Argon2<'static>, DbError> {
    let params = Params::new(
        config.memory_kib,
        config.iterations,
        config.parallelism,
        None,
    )
    .map_err(|e| DbError::PasswordHash(e.to_string()))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

fn hash_with(hasher: &Argon2<'_>, password: &str) -> Result<String, DbError> {
    let salt = SaltString::generate(&mut OsRng);
    hasher
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DbError::PasswordHash(e.to_string()))
}

/// Verify against a stored PHC string; its embedded parameters are used.
fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::join_all;
    use std::time::Instant;
    use tempfile::{TempDir, tempdir};

    fn fast_hashing() -> PasswordHashingConfig {
        PasswordHashingConfig {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        }
    }

    fn config_for(url: String, pool_size: usize) -> StoreConfig {
        StoreConfig {
            url,
            pool_size,
            busy_timeout_ms: 5_000,
            password_hashing: fast_hashing(),
        }
    }

    async fn create_test_store(pool_size: usize) -> (CredentialStore, TempDir) {
        let dir = tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("users.db").display());
        let store = CredentialStore::connect(&config_for(url, pool_size))
            .await
            .unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_register_then_authenticate() {
        let (store, _dir) = create_test_store(2).await;

        let outcome = store.register("alice", "hunter2").await.unwrap();
        assert_eq!(outcome, RegisterOutcome::Created);

        assert!(store.authenticate("alice", "hunter2").await.unwrap());
        assert!(!store.authenticate("alice", "wrong").await.unwrap());
        assert!(!store.authenticate("bob", "hunter2").await.unwrap());
    }

    #[tokio::test]
    async fn test_password_is_not_stored_in_plain_text() {
        let (store, _dir) = create_test_store(1).await;
        store.register("alice", "hunter2").await.unwrap();

        let users = store.find_user("alice").await.unwrap();
        assert_eq!(users.len(), 1);
        assert_ne!(users[0].password_hash, "hunter2");
        assert!(users[0].password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_duplicate_registration_inserts_nothing() {
        let (store, _dir) = create_test_store(2).await;
        store.register("alice", "first").await.unwrap();

        let outcome = store.register("alice", "second").await.unwrap();
        assert_eq!(outcome, RegisterOutcome::AlreadyExists);

        let rows = store
            .execute_prepared(Statement::AuthenticateUser, &["alice"])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert!(store.authenticate("alice", "first").await.unwrap());
        assert!(!store.authenticate("alice", "second").await.unwrap());
    }

    #[tokio::test]
    async fn test_store_error_releases_connection() {
        let (store, _dir) = create_test_store(2).await;
        store
            .execute_prepared(Statement::RegisterUser, &["alice", "x"])
            .await
            .unwrap();

        let Err(err) = store
            .execute_prepared(Statement::RegisterUser, &["alice", "y"])
            .await
        else {
            panic!("duplicate insert succeeded");
        };
        assert!(err.is_unique_violation());
        assert_eq!(store.pool().available(), store.pool().size());

        // The rolled-back connection is still usable.
        let rows = store
            .execute_prepared(Statement::AuthenticateUser, &["alice"])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_wrong_arity_is_rejected_before_acquire() {
        let (store, _dir) = create_test_store(1).await;
        let Err(err) = store
            .execute_prepared(Statement::RegisterUser, &["alice"])
            .await
        else {
            panic!("wrong arity was accepted");
        };
        assert!(matches!(
            err,
            DbError::Arity {
                expected: 2,
                actual: 1,
                ..
            }
        ));
        assert_eq!(store.pool().available(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_authentications_with_one_connection() {
        let (store, _dir) = create_test_store(1).await;
        store.register("alice", "hunter2").await.unwrap();
        let store = Arc::new(store);

        let tasks: Vec<_> = (0..8)
            .map(|n| {
                let store = Arc::clone(&store);
                let password = if n % 2 == 0 { "hunter2" } else { "wrong" };
                tokio::spawn(async move { store.authenticate("alice", password).await })
            })
            .collect();
        for (n, task) in tasks.into_iter().enumerate() {
            assert_eq!(task.await.unwrap().unwrap(), n % 2 == 0);
        }

        assert_eq!(store.pool().available(), 1);
        assert_eq!(store.hash_permits.available_permits(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_hashing_leaves_the_runtime_free() {
        let dir = tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("users.db").display());
        let mut config = config_for(url, 1);
        config.password_hashing = PasswordHashingConfig {
            memory_kib: 8 * 1024,
            iterations: 2,
            parallelism: 1,
        };
        let store = CredentialStore::connect(&config).await.unwrap();
        store.register("alice", "hunter2").await.unwrap();

        let stored = store.find_user("alice").await.unwrap().remove(0).password_hash;
        let started = Instant::now();
        assert!(verify_password("hunter2", &stored));
        let one_verify = started.elapsed();

        // On a single-threaded runtime, inline hashing would stall this
        // ticker for at least one verification.
        let mut longest = Duration::ZERO;
        let ticker = async {
            loop {
                let before = Instant::now();
                tokio::time::sleep(Duration::from_millis(1)).await;
                longest = longest.max(before.elapsed());
            }
        };
        let auths = join_all((0..4).map(|_| store.authenticate("alice", "hunter2")));
        let results = tokio::select! {
            results = auths => results,
            _ = ticker => unreachable!("ticker never finishes"),
        };

        assert!(results.into_iter().all(|r| r.unwrap()));
        assert!(
            longest < one_verify,
            "runtime stalled for {longest:?}, one verification takes {one_verify:?}"
        );
    }

    #[tokio::test]
    async fn test_users_persist_across_reconnect() {
        let dir = tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("users.db").display());

        let store = CredentialStore::connect(&config_for(url.clone(), 1))
            .await
            .unwrap();
        store.register("alice", "hunter2").await.unwrap();
        store.close().await;

        let reopened = CredentialStore::connect(&config_for(url, 1)).await.unwrap();
        assert!(reopened.authenticate("alice", "hunter2").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_store_is_shared_by_pooled_connections() {
        let store = CredentialStore::connect(&config_for(":memory:".to_string(), 2))
            .await
            .unwrap();
        store.register("alice", "hunter2").await.unwrap();

        // Pin one connection so the lookup runs on the other.
        let pinned = store.pool().acquire().await.unwrap();
        assert!(store.authenticate("alice", "hunter2").await.unwrap());
        drop(pinned);
    }

    #[tokio::test]
    async fn test_connect_fails_for_unreachable_path() {
        let config = config_for(
            "sqlite:///nonexistent/chatroomd/users.db".to_string(),
            1,
        );
        assert!(CredentialStore::connect(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_close_rejects_further_queries() {
        let (store, _dir) = create_test_store(1).await;
        store.close().await;
        let err = store.find_user("alice").await.unwrap_err();
        assert!(matches!(err, DbError::Pool(_)));
    }

    #[test]
    fn test_invalid_hashing_params_are_rejected() {
        let config = PasswordHashingConfig {
            memory_kib: 1,
            iterations: 1,
            parallelism: 1,
        };
        assert!(matches!(
            argon2_hasher(&config),
            Err(DbError::PasswordHash(_))
        ));
    }

    #[test]
    fn test_memory_urls() {
        assert!(is_memory(":memory:"));
        assert!(is_memory("sqlite::memory:"));
        assert!(!is_memory("sqlite://chat.db"));
    }
}
