//! chatroomd - multi-room, authenticated, line-delimited chat daemon.

use chatroomd::config::{Config, validate};
use chatroomd::db::CredentialStore;
use chatroomd::network::Gateway;
use chatroomd::state::Hub;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!(
            "{} configuration error(s) in {}",
            errors.len(),
            config_path
        );
    }

    info!(
        server = %config.server.name,
        listen = %config.listen.address,
        "Starting chatroomd"
    );

    // Credential store: every pooled connection is opened up front
    let store = CredentialStore::connect(&config.store).await.map_err(|e| {
        error!(url = %config.store.url, error = %e, "Failed to open credential store");
        e
    })?;

    let hub = Arc::new(Hub::new(&config, store));
    let gateway = Gateway::bind(config.listen.address, Arc::clone(&hub)).await?;

    tokio::spawn({
        let hub = Arc::clone(&hub);
        async move {
            shutdown_signal().await;
            hub.registry.close();
        }
    });

    info!("Press Enter to stop the server");
    gateway.run().await?;

    hub.store.close().await;
    info!("Server stopped");
    Ok(())
}

/// Resolve on Ctrl+C, SIGTERM, or a line on stdin.
async fn shutdown_signal() {
    let console = console_line();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let terminate = async {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => info!("Received Ctrl+C"),
                Err(e) => error!(error = %e, "Failed to listen for Ctrl+C"),
            },
            _ = terminate => info!("Received SIGTERM"),
            _ = console => info!("Received console shutdown"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => info!("Received Ctrl+C"),
                Err(e) => error!(error = %e, "Failed to listen for Ctrl+C"),
            },
            _ = console => info!("Received console shutdown"),
        }
    }
}

/// Resolve when a line is entered on stdin. Never resolves if stdin is
/// closed or unreadable, so a detached process keeps running.
async fn console_line() {
    let (tx, rx) = oneshot::channel();

    // A plain thread: a blocking stdin read would otherwise hold up runtime
    // shutdown.
    std::thread::spawn(move || {
        let mut line = String::new();
        if matches!(std::io::stdin().read_line(&mut line), Ok(n) if n > 0) {
            let _ = tx.send(());
        }
    });

    if rx.await.is_err() {
        std::future::pending::<()>().await;
    }
}
