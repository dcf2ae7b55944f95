//! Connection identifiers and the handle other components hold for a
//! connection.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Process-unique connection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Hands out sequential connection ids, starting at 1.
#[derive(Debug)]
pub struct ConnectionIdGenerator {
    counter: AtomicU64,
}

impl ConnectionIdGenerator {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(1),
        }
    }

    pub fn next(&self) -> ConnectionId {
        ConnectionId(self.counter.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving end of a connection's outbound queue.
pub type Outbound = mpsc::Receiver<Arc<str>>;

/// Non-owning handle to a live connection.
///
/// Cloning is cheap. Sessions and the registry hold handles; the connection
/// task owns the socket and the receiving end of the queue. Delivering never
/// suspends, and delivering to a connection that already exited is a no-op.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    addr: SocketAddr,
    outbound: mpsc::Sender<Arc<str>>,
    closer: CancellationToken,
}

impl ConnectionHandle {
    /// Create a handle together with a queue holding up to `sendq` lines.
    pub fn new(id: ConnectionId, addr: SocketAddr, sendq: usize) -> (Self, Outbound) {
        let (outbound, rx) = mpsc::channel(sendq);
        let handle = Self {
            id,
            addr,
            outbound,
            closer: CancellationToken::new(),
        };
        (handle, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Append a line to the outbound queue. Returns false once the
    /// connection task has gone away, or when the queue is full; a full
    /// queue closes the connection.
    pub fn deliver(&self, line: Arc<str>) -> bool {
        match self.outbound.try_send(line) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                if !self.is_closed() {
                    warn!(conn = %self.id, addr = %self.addr, "Send queue exceeded - closing");
                    self.close();
                }
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Ask the connection task to flush and shut the socket down.
    /// Idempotent.
    pub fn close(&self) {
        self.closer.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closer.is_cancelled()
    }

    /// Resolves once [`ConnectionHandle::close`] has been called.
    pub async fn closed(&self) {
        self.closer.cancelled().await;
    }
}
