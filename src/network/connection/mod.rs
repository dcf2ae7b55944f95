//! Connection - Handles an individual client connection.
//!
//! Each Connection runs in its own Tokio task:
//!
//! ```text
//!    ┌───────────────────────────────────────────────────┐
//!    │                  Connection Task                  │
//!    │                                                   │
//!    │  ┌──────────────────┐       ┌──────────────────┐  │
//!    │  │ FramedRead       │       │ FramedWrite      │  │
//!    │  │ (LineCodec)      │       │ (LineCodec)      │  │
//!    │  └────────┬─────────┘       └────────▲─────────┘  │
//!    │           │                          │            │
//!    │           ▼                          │            │
//!    │    tokio::select! ──────────▶ outbound queue ◀────┼── Session fan-out
//!    │           │                                       │
//!    │           ▼                                       │
//!    │    [StateMachine] ──▶ CredentialStore / Registry  │
//!    └───────────────────────────────────────────────────┘
//! ```
//!
//! One line is written at a time, in queue order. A write that stalls
//! because the peer stopped reading is abandoned once the connection is
//! closed (for example when its send queue overflows). When the loop ends the
//! connection leaves its room, is dropped from the registry, and gets a
//! bounded chance to flush whatever is still queued before the socket is
//! shut down.

mod command;
mod machine;

use machine::{StateMachine, Step};

use super::LineCodec;
use crate::error::{CommandError, ConnectionError};
use crate::state::{ConnectionHandle, ConnectionId, Hub, Outbound};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodecError};
use tracing::{debug, info, instrument, warn};

type LineWriter = FramedWrite<OwnedWriteHalf, LineCodec>;

/// A client connection handler.
pub struct Connection {
    id: ConnectionId,
    addr: SocketAddr,
    stream: TcpStream,
    hub: Arc<Hub>,
}

impl Connection {
    pub fn new(id: ConnectionId, stream: TcpStream, addr: SocketAddr, hub: Arc<Hub>) -> Self {
        Self {
            id,
            addr,
            stream,
            hub,
        }
    }

    /// Run the connection until the client leaves or the server closes it.
    #[instrument(skip(self), fields(conn = %self.id, addr = %self.addr), name = "connection")]
    pub async fn run(self) -> anyhow::Result<()> {
        let Self {
            id,
            addr,
            stream,
            hub,
        } = self;

        let (handle, mut outbound) = ConnectionHandle::new(id, addr, hub.limits.sendq);
        if hub.registry.register_connection(handle.clone()).is_err() {
            debug!("Registry closed - dropping connection");
            return Ok(());
        }
        info!("Client connected");

        let (read_half, write_half) = stream.into_split();
        let mut reader = FramedRead::new(
            read_half,
            LineCodec::with_max_len(hub.limits.max_line_length),
        );
        let mut writer = FramedWrite::new(write_half, LineCodec::new());

        let mut machine = StateMachine::new(Arc::clone(&hub), handle.clone());
        machine.start();

        let result: Result<(), ConnectionError> = loop {
            tokio::select! {
                biased;

                // BRANCH A: close requested (auth failure, session close, shutdown)
                _ = handle.closed() => {
                    debug!("Close requested");
                    break Ok(());
                }

                // BRANCH B: outbound queue, one write in flight at a time
                Some(line) = outbound.recv() => {
                    let sent = tokio::select! {
                        biased;
                        result = writer.send(line) => Some(result),
                        _ = handle.closed() => None,
                    };
                    match sent {
                        Some(Ok(())) => {}
                        Some(Err(e)) => break Err(e.into()),
                        None => {
                            debug!("Close requested during a stalled write");
                            break Ok(());
                        }
                    }
                }

                // BRANCH C: network input
                frame = reader.next() => match frame {
                    Some(Ok(line)) => {
                        if machine.on_line(&line).await == Step::Close {
                            break Ok(());
                        }
                    }
                    Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                        let err = CommandError::LineTooLong;
                        warn!(
                            code = err.error_code(),
                            limit = hub.limits.max_line_length,
                            state = machine.state().as_str(),
                            "Line too long - closing"
                        );
                        handle.deliver(Arc::from(err.reply()));
                        if err.is_fatal() {
                            break Ok(());
                        }
                    }
                    Some(Err(e)) => break Err(e.into()),
                    None => {
                        info!(
                            state = machine.state().as_str(),
                            session = ?machine.session().map(|s| s.id()),
                            "Client disconnected"
                        );
                        break Ok(());
                    }
                },
            }
        };

        machine.finish();
        hub.registry.unregister_connection(id);
        handle.close();

        match tokio::time::timeout(
            hub.limits.shutdown_flush(),
            flush_and_shutdown(&mut writer, &mut outbound),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "Final flush failed"),
            Err(_) => debug!("Final flush timed out"),
        }

        match result {
            Err(e) if e.is_disconnect() => {
                info!(error = %e, "Client disconnected");
                Ok(())
            }
            result => result.map_err(Into::into),
        }
    }
}

/// Write everything still queued, then shut down the write side.
async fn flush_and_shutdown(
    writer: &mut LineWriter,
    outbound: &mut Outbound,
) -> Result<(), LinesCodecError> {
    while let Ok(line) = outbound.try_recv() {
        writer.feed(line).await?;
    }
    SinkExt::<Arc<str>>::close(writer).await
}
