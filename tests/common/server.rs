//! Test server management.
//!
//! Runs a chatroomd instance inside the test runtime, on an ephemeral port,
//! against a SQLite database in a temporary directory.

#![allow(dead_code)]

use chatroomd::config::Config;
use chatroomd::db::CredentialStore;
use chatroomd::network::Gateway;
use chatroomd::state::{Hub, SessionId};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use super::client::TestClient;

/// A test server instance.
pub struct TestServer {
    addr: SocketAddr,
    hub: Arc<Hub>,
    task: Option<JoinHandle<anyhow::Result<()>>>,
    _data_dir: TempDir,
}

impl TestServer {
    /// Spawn a server with the default test configuration.
    pub async fn spawn() -> anyhow::Result<Self> {
        Self::spawn_with(|_| {}).await
    }

    /// Spawn a server, adjusting the test configuration first.
    pub async fn spawn_with(configure: impl FnOnce(&mut Config)) -> anyhow::Result<Self> {
        let data_dir = tempfile::tempdir()?;
        let db_path = data_dir.path().join("users.db");

        let mut config: Config = toml::from_str(&format!(
            r#"
[server]
name = "test.server"

[listen]
address = "127.0.0.1:0"

[store]
url = "sqlite://{}"
pool_size = 2

[store.password_hashing]
memory_kib = 8
iterations = 1
parallelism = 1

[limits]
shutdown_flush_ms = 500
"#,
            db_path.display()
        ))?;
        configure(&mut config);

        if let Err(errors) = chatroomd::config::validate(&config) {
            anyhow::bail!("invalid test config: {errors:?}");
        }

        let store = CredentialStore::connect(&config.store).await?;
        let hub = Arc::new(Hub::new(&config, store));

        let listener = TcpListener::bind(config.listen.address).await?;
        let gateway = Gateway::from_listener(listener, Arc::clone(&hub));
        let addr = gateway.local_addr()?;
        let task = tokio::spawn(gateway.run());

        Ok(Self {
            addr,
            hub,
            task: Some(task),
            _data_dir: data_dir,
        })
    }

    /// Get the server address.
    pub fn address(&self) -> SocketAddr {
        self.addr
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Create a new test client connected to this server.
    pub async fn connect(&self) -> anyhow::Result<TestClient> {
        TestClient::connect(self.addr).await
    }

    /// Connect and register a new user; the client is left at the room prompt.
    pub async fn signup(&self, username: &str, password: &str) -> anyhow::Result<TestClient> {
        let mut client = self.connect().await?;
        client.register(username, password).await?;
        Ok(client)
    }

    /// Connect and sign in an existing user; the client is left at the room prompt.
    pub async fn login(&self, username: &str, password: &str) -> anyhow::Result<TestClient> {
        let mut client = self.connect().await?;
        client.authenticate(username, password).await?;
        Ok(client)
    }

    /// Current member count of room `id`, if it exists.
    pub fn member_count(&self, id: u32) -> Option<usize> {
        self.hub
            .registry
            .get_session(SessionId::new(id))
            .map(|session| session.member_count())
    }

    /// Wait until room `id` has exactly `members` members.
    pub async fn wait_for_members(&self, id: u32, members: usize) -> anyhow::Result<()> {
        for _ in 0..100 {
            if self.member_count(id) == Some(members) {
                return Ok(());
            }
            sleep(Duration::from_millis(20)).await;
        }
        anyhow::bail!("room {id} never reached {members} member(s)")
    }

    /// Wait until no connection is tracked by the registry.
    pub async fn wait_for_no_connections(&self) -> anyhow::Result<()> {
        for _ in 0..100 {
            if self.hub.registry.connection_count() == 0 {
                return Ok(());
            }
            sleep(Duration::from_millis(20)).await;
        }
        anyhow::bail!(
            "{} connection(s) still tracked",
            self.hub.registry.connection_count()
        )
    }

    /// Close the registry and wait for the gateway to finish.
    pub async fn shutdown(&mut self) -> anyhow::Result<()> {
        self.hub.registry.close();
        if let Some(task) = self.task.take() {
            tokio::time::timeout(Duration::from_secs(5), task).await???;
        }
        self.hub.store.close().await;
        Ok(())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.hub.registry.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
