//! The per-connection protocol state machine.
//!
//! ```text
//! Connected → AwaitingCredentials → (Registering | Authenticating)
//!           → AwaitingRoomChoice → InRoom → Closed
//! ```
//!
//! The machine never touches the socket. Every reply goes through the
//! connection's outbound queue, the same queue room broadcasts arrive on,
//! so the client sees prompts, replies and chat in one FIFO order.

use super::command::{
    CredentialKind, Credentials, RoomChoice, parse_credentials, parse_room_choice,
};
use crate::db::RegisterOutcome;
use crate::replies;
use crate::state::{ConnectionHandle, Hub, RegistryError, Session};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where a connection is in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolState {
    Connected,
    AwaitingCredentials,
    Registering,
    Authenticating,
    AwaitingRoomChoice,
    InRoom,
    Closed,
}

impl ProtocolState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::AwaitingCredentials => "awaiting_credentials",
            Self::Registering => "registering",
            Self::Authenticating => "authenticating",
            Self::AwaitingRoomChoice => "awaiting_room_choice",
            Self::InRoom => "in_room",
            Self::Closed => "closed",
        }
    }
}

/// What the connection task does after a line has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Close,
}

pub struct StateMachine {
    hub: Arc<Hub>,
    handle: ConnectionHandle,
    state: ProtocolState,
    session: Option<Arc<Session>>,
    user: Option<String>,
}

impl StateMachine {
    pub fn new(hub: Arc<Hub>, handle: ConnectionHandle) -> Self {
        Self {
            hub,
            handle,
            state: ProtocolState::Connected,
            session: None,
            user: None,
        }
    }

    pub fn state(&self) -> ProtocolState {
        self.state
    }

    /// The room this connection joined, if any.
    pub fn session(&self) -> Option<&Arc<Session>> {
        self.session.as_ref()
    }

    /// Send the first prompt.
    pub fn start(&mut self) {
        self.await_credentials();
    }

    /// Handle one inbound line (delimiter already stripped).
    pub async fn on_line(&mut self, line: &str) -> Step {
        match self.state {
            ProtocolState::AwaitingCredentials => self.on_credentials(line).await,
            ProtocolState::AwaitingRoomChoice => self.on_room_choice(line),
            ProtocolState::InRoom => {
                if let Some(session) = &self.session {
                    session.broadcast_from(self.handle.id(), line);
                }
                Step::Continue
            }
            // Lines are only read between store calls; nothing is expected here.
            ProtocolState::Connected
            | ProtocolState::Registering
            | ProtocolState::Authenticating
            | ProtocolState::Closed => Step::Close,
        }
    }

    /// Leave the joined room, if any. Called once on the way out.
    pub fn finish(&mut self) {
        if let Some(session) = self.session.take() {
            self.hub.registry.leave_session(&session, self.handle.id());
            debug!(session = %session.id(), "Left session");
        }
        self.state = ProtocolState::Closed;
    }

    fn send(&self, line: &str) {
        self.handle.deliver(Arc::from(line));
    }

    fn await_credentials(&mut self) {
        self.state = ProtocolState::AwaitingCredentials;
        self.send(replies::CREDENTIALS_PROMPT);
    }

    fn await_room_choice(&mut self) {
        self.state = ProtocolState::AwaitingRoomChoice;
        self.send(replies::ROOM_PROMPT);
    }

    async fn on_credentials(&mut self, line: &str) -> Step {
        match parse_credentials(line) {
            Ok(credentials) => match credentials.kind {
                CredentialKind::Register => self.register(credentials).await,
                CredentialKind::Authenticate => self.authenticate(credentials).await,
            },
            Err(e) => {
                debug!(code = e.error_code(), "Malformed credentials line");
                self.send(e.reply());
                self.await_credentials();
                Step::Continue
            }
        }
    }

    async fn register(&mut self, credentials: Credentials) -> Step {
        self.state = ProtocolState::Registering;
        let Credentials {
            username, password, ..
        } = credentials;

        match self.hub.store.register(&username, &password).await {
            Ok(RegisterOutcome::Created) => {
                info!(user = %username, "User registered");
                self.send(replies::REGISTRATION_SUCCESSFUL);
                self.user = Some(username);
                self.await_room_choice();
            }
            Ok(RegisterOutcome::AlreadyExists) => {
                debug!(user = %username, "Registration for existing user");
                self.send(replies::USER_ALREADY_EXISTS);
                self.await_credentials();
            }
            Err(e) => {
                warn!(user = %username, error = %e, "Registration failed");
                self.send(replies::REGISTRATION_FAILED);
                self.await_credentials();
            }
        }
        Step::Continue
    }

    async fn authenticate(&mut self, credentials: Credentials) -> Step {
        self.state = ProtocolState::Authenticating;
        let Credentials {
            username, password, ..
        } = credentials;

        match self.hub.store.authenticate(&username, &password).await {
            Ok(true) => {
                info!(user = %username, "User authenticated");
                self.send(replies::AUTHENTICATION_SUCCESSFUL);
                self.user = Some(username);
                self.await_room_choice();
                Step::Continue
            }
            Ok(false) => {
                info!(user = %username, "Authentication failed");
                self.send(replies::AUTHENTICATION_FAILED);
                self.state = ProtocolState::Closed;
                Step::Close
            }
            Err(e) => {
                warn!(user = %username, error = %e, "Credential store error during authentication");
                self.send(replies::AUTHENTICATION_FAILED);
                self.state = ProtocolState::Closed;
                Step::Close
            }
        }
    }

    fn on_room_choice(&mut self, line: &str) -> Step {
        let registry = &self.hub.registry;

        let joined = match parse_room_choice(line) {
            Ok(RoomChoice::Create) => match registry.create_and_join(self.handle.clone()) {
                Ok(session) => {
                    self.send(&replies::session_created(session.id()));
                    Some(session)
                }
                Err(RegistryError::Closed) => return Step::Close,
                Err(RegistryError::Exhausted) => {
                    warn!("No free session id");
                    None
                }
            },
            Ok(RoomChoice::Join(id)) => registry.join_session(id, self.handle.clone()),
            Err(e) => {
                debug!(code = e.error_code(), "Unparseable session id");
                None
            }
        };

        match joined {
            Some(session) => {
                info!(session = %session.id(), user = ?self.user, "Joined session");
                self.session = Some(session);
                self.state = ProtocolState::InRoom;
            }
            None => {
                self.send(replies::INVALID_SESSION_ID);
                self.await_room_choice();
            }
        }
        Step::Continue
    }
}
