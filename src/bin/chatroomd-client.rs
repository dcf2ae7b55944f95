//! chatroomd-client - console client for chatroomd.
//!
//! Usage: `chatroomd-client [host:port]` (default `127.0.0.1:5555`).
//!
//! Lines typed on stdin are sent to the server and every line the server
//! sends is printed to stdout. When stdin ends the write side is shut down
//! and the client keeps printing until the server closes the connection.

use chatroomd::network::LineCodec;
use futures_util::{SinkExt, StreamExt};
use std::io::BufRead;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_ADDRESS: &str = "127.0.0.1:5555";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they never mix with chat output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let address = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_ADDRESS.to_string());

    let stream = TcpStream::connect(&address).await.map_err(|e| {
        error!(%address, error = %e, "Failed to connect");
        e
    })?;
    info!(%address, "Connected");

    let (read_half, write_half) = stream.into_split();
    let mut from_server = FramedRead::new(read_half, LineCodec::new());
    let mut to_server = FramedWrite::new(write_half, LineCodec::new());
    let mut input = stdin_lines();
    let mut input_open = true;
    let mut stdout = tokio::io::stdout();

    loop {
        tokio::select! {
            frame = from_server.next() => match frame {
                Some(Ok(line)) => {
                    stdout.write_all(line.as_bytes()).await?;
                    stdout.write_all(b"\n").await?;
                    stdout.flush().await?;
                }
                Some(Err(e)) => {
                    error!(error = %e, "Read from server failed");
                    break;
                }
                None => {
                    info!("Server disconnected");
                    break;
                }
            },

            line = input.recv(), if input_open => match line {
                Some(line) => to_server.send(line).await?,
                None => {
                    input_open = false;
                    SinkExt::<Arc<str>>::close(&mut to_server).await?;
                }
            },
        }
    }

    Ok(())
}

/// Lines read from stdin on a plain thread; the channel closes at EOF.
///
/// A blocking read on tokio's stdin would hold up runtime shutdown after the
/// server goes away.
fn stdin_lines() -> mpsc::Receiver<Arc<str>> {
    let (tx, rx) = mpsc::channel(64);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(Arc::from(line)).is_err() {
                break;
            }
        }
    });
    rx
}
