//! Session registry.
//!
//! Owns the id → session mapping and the set of live connections, and
//! coordinates shutdown. A single mutex guards the mapping, the connection
//! set and the shutdown flag. When both locks are needed the registry lock
//! is taken first, then the session lock.

use super::handle::{ConnectionHandle, ConnectionId};
use super::session::{Session, SessionId};
use crate::config::RoomsConfig;
use crate::replies::SHUTDOWN_NOTICE;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Registry errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("registry is closed")]
    Closed,
    #[error("no free session id")]
    Exhausted,
}

#[derive(Default)]
struct Rooms {
    sessions: HashMap<SessionId, Arc<Session>>,
    connections: HashMap<ConnectionId, ConnectionHandle>,
    closed: bool,
}

impl Rooms {
    /// Insert a new empty session under the smallest unused positive id.
    fn insert_new(&mut self) -> Result<Arc<Session>, RegistryError> {
        if self.closed {
            return Err(RegistryError::Closed);
        }
        let id = (1..=u32::MAX)
            .map(SessionId::new)
            .find(|id| !self.sessions.contains_key(id))
            .ok_or(RegistryError::Exhausted)?;
        let session = Arc::new(Session::new(id));
        self.sessions.insert(id, Arc::clone(&session));
        info!(session = %id, "Session created");
        Ok(session)
    }

    fn get(&self, id: SessionId) -> Option<&Arc<Session>> {
        if self.closed {
            return None;
        }
        self.sessions.get(&id)
    }
}

/// Process-wide owner of rooms and live connections.
pub struct SessionRegistry {
    rooms: Mutex<Rooms>,
    remove_when_empty: bool,
    shutdown: CancellationToken,
}

impl SessionRegistry {
    pub fn new(config: &RoomsConfig) -> Self {
        Self {
            rooms: Mutex::new(Rooms::default()),
            remove_when_empty: config.remove_when_empty,
            shutdown: CancellationToken::new(),
        }
    }

    /// Create an empty session and return its id.
    pub fn create_session(&self) -> Result<SessionId, RegistryError> {
        self.rooms.lock().insert_new().map(|session| session.id())
    }

    /// Look up a session. Always `None` after [`SessionRegistry::close`].
    pub fn get_session(&self, id: SessionId) -> Option<Arc<Session>> {
        self.rooms.lock().get(id).cloned()
    }

    /// Create a session and join `handle` to it in one step.
    pub fn create_and_join(&self, handle: ConnectionHandle) -> Result<Arc<Session>, RegistryError> {
        let mut rooms = self.rooms.lock();
        let session = rooms.insert_new()?;
        session.join(handle);
        Ok(session)
    }

    /// Join `handle` to an existing session. `None` if there is no such
    /// session (or the registry is closed).
    pub fn join_session(&self, id: SessionId, handle: ConnectionHandle) -> Option<Arc<Session>> {
        let rooms = self.rooms.lock();
        let session = rooms.get(id)?;
        session.join(handle);
        Some(Arc::clone(session))
    }

    /// Remove `conn` from `session`, reaping the session if it is now empty
    /// and empty rooms are not kept.
    pub fn leave_session(&self, session: &Arc<Session>, conn: ConnectionId) {
        let mut rooms = self.rooms.lock();
        session.leave(conn);

        if !self.remove_when_empty || !session.is_empty() {
            return;
        }
        let id = session.id();
        let current = rooms
            .sessions
            .get(&id)
            .is_some_and(|entry| Arc::ptr_eq(entry, session));
        if current {
            rooms.sessions.remove(&id);
            info!(session = %id, "Empty session removed");
        }
    }

    /// Track a live connection so shutdown can reach it.
    pub fn register_connection(&self, handle: ConnectionHandle) -> Result<(), RegistryError> {
        let mut rooms = self.rooms.lock();
        if rooms.closed {
            return Err(RegistryError::Closed);
        }
        rooms.connections.insert(handle.id(), handle);
        Ok(())
    }

    pub fn unregister_connection(&self, conn: ConnectionId) {
        self.rooms.lock().connections.remove(&conn);
    }

    /// Shut everything down. Idempotent.
    ///
    /// Every session receives the shutdown notice and is closed, every
    /// tracked connection is closed, and finally the shutdown token fires so
    /// the gateway stops accepting.
    pub fn close(&self) {
        {
            let mut rooms = self.rooms.lock();
            if rooms.closed {
                return;
            }
            rooms.closed = true;

            let sessions = rooms.sessions.len();
            for session in rooms.sessions.values() {
                session.deliver(SHUTDOWN_NOTICE);
                session.close();
            }
            rooms.sessions.clear();

            let connections = rooms.connections.len();
            for handle in rooms.connections.values() {
                handle.close();
            }
            info!(sessions, connections, "Registry closed");
        }

        self.shutdown.cancel();
        debug!("Shutdown signalled");
    }

    /// Cancelled once [`SessionRegistry::close`] has run.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.rooms.lock().closed
    }

    pub fn session_count(&self) -> usize {
        self.rooms.lock().sessions.len()
    }

    pub fn connection_count(&self) -> usize {
        self.rooms.lock().connections.len()
    }
}
