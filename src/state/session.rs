//! A chat room.
//!
//! A session holds handles to its members, never the connections
//! themselves. One mutex serializes join, leave, delivery and close, so a
//! broadcast is fanned out to every member before the next one starts.

use super::handle::{ConnectionHandle, ConnectionId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Registry-assigned room id. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u32);

impl SessionId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One chat room and its members.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    members: Mutex<HashMap<ConnectionId, ConnectionHandle>>,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            members: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Add a member. No-op if it is already present.
    pub fn join(&self, handle: ConnectionHandle) {
        let conn = handle.id();
        let mut members = self.members.lock();
        if members.contains_key(&conn) {
            return;
        }
        members.insert(conn, handle);
        debug!(session = %self.id, %conn, members = members.len(), "Member joined");
    }

    /// Remove a member. Returns whether it was present.
    pub fn leave(&self, conn: ConnectionId) -> bool {
        let mut members = self.members.lock();
        let removed = members.remove(&conn).is_some();
        if removed {
            debug!(session = %self.id, %conn, members = members.len(), "Member left");
        }
        removed
    }

    /// Enqueue `line` on every member.
    pub fn deliver(&self, line: &str) {
        let line: Arc<str> = Arc::from(line);
        let members = self.members.lock();
        for member in members.values() {
            member.deliver(Arc::clone(&line));
        }
    }

    /// Enqueue `line` on every member except `sender`.
    pub fn broadcast_from(&self, sender: ConnectionId, line: &str) {
        let line: Arc<str> = Arc::from(line);
        let members = self.members.lock();
        for (id, member) in members.iter() {
            if *id != sender {
                member.deliver(Arc::clone(&line));
            }
        }
    }

    /// Close every member and clear the membership. Idempotent.
    pub fn close(&self) {
        let mut members = self.members.lock();
        if members.is_empty() {
            return;
        }
        for member in members.values() {
            member.close();
        }
        debug!(session = %self.id, closed = members.len(), "Session closed");
        members.clear();
    }

    pub fn member_count(&self) -> usize {
        self.members.lock().len()
    }

    pub fn contains(&self, conn: ConnectionId) -> bool {
        self.members.lock().contains_key(&conn)
    }

    pub fn is_empty(&self) -> bool {
        self.members.lock().is_empty()
    }
}
