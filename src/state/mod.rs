//! Shared server state.
//!
//! - [`hub`]: the context object passed to every connection task
//! - [`registry`]: rooms by id, live connections, shutdown
//! - [`session`]: one room and its members
//! - [`handle`]: connection ids and the handle sessions hold

mod handle;
mod hub;
mod registry;
mod session;

pub use handle::{ConnectionHandle, ConnectionId, ConnectionIdGenerator, Outbound};
pub use hub::Hub;
pub use registry::{RegistryError, SessionRegistry};
pub use session::{Session, SessionId};
