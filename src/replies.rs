//! Lines the server writes to clients.
//!
//! Every constant is the logical line; the codec appends the `\n`.

use crate::state::SessionId;

pub const CREDENTIALS_PROMPT: &str =
    "Please sign up or sign in (use \"REG\" or \"AUTH\" <username> <password>):";
pub const INVALID_COMMAND_FORMAT: &str = "Invalid command format";
pub const REGISTRATION_SUCCESSFUL: &str = "Registration successful";
pub const USER_ALREADY_EXISTS: &str = "User already exists";
pub const REGISTRATION_FAILED: &str = "Registration failed";
pub const AUTHENTICATION_SUCCESSFUL: &str = "Authentication successful";
pub const AUTHENTICATION_FAILED: &str = "Authentication failed";

pub const ROOM_PROMPT: &str = "Enter chat session ID (or 0 to create new session):";
pub const INVALID_SESSION_ID: &str = "Invalid chat session ID";

pub const SHUTDOWN_NOTICE: &str = "Server is shutting down";
pub const LINE_TOO_LONG: &str = "Line too long";

/// `New chat session created with ID: <id>`
pub fn session_created(id: SessionId) -> String {
    format!("New chat session created with ID: {id}")
}
