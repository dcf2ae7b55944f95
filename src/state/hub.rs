//! The shared context every connection task runs against.

use super::handle::{ConnectionId, ConnectionIdGenerator};
use super::registry::SessionRegistry;
use crate::config::{Config, LimitsConfig};
use crate::db::CredentialStore;

/// Registry, credential store and limits for one server instance.
///
/// Built once at startup and shared behind an `Arc`. Tests build one per
/// server so instances never see each other's rooms or users.
pub struct Hub {
    pub registry: SessionRegistry,
    pub store: CredentialStore,
    pub limits: LimitsConfig,
    conn_ids: ConnectionIdGenerator,
}

impl Hub {
    pub fn new(config: &Config, store: CredentialStore) -> Self {
        Self {
            registry: SessionRegistry::new(&config.rooms),
            store,
            limits: config.limits.clone(),
            conn_ids: ConnectionIdGenerator::new(),
        }
    }

    pub fn next_connection_id(&self) -> ConnectionId {
        self.conn_ids.next()
    }
}
