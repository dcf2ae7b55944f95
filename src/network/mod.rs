//! Network module.
//!
//! Contains the Gateway (TCP listener), the per-client Connection task and
//! the line codec both ends of the wire use.

mod codec;
mod connection;
mod gateway;

pub use codec::LineCodec;
pub use connection::Connection;
pub use gateway::Gateway;
