//! chatroomd - multi-room, authenticated, line-delimited chat daemon.
//!
//! Clients sign up or sign in against a SQLite credential store, then
//! create or join a numbered room and exchange lines with everyone else in
//! it.

pub mod config;
pub mod db;
pub mod error;
pub mod network;
pub mod replies;
pub mod state;
