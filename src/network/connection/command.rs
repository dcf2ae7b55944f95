//! Parsing of the two client inputs that precede the room: the credentials
//! line and the room choice.

use crate::error::CommandError;
use crate::state::SessionId;
use std::fmt;

/// Which credentials command the client sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    /// `REG <username> <password>`
    Register,
    /// `AUTH <username> <password>`
    Authenticate,
}

/// A parsed credentials line.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub kind: CredentialKind,
    pub username: String,
    pub password: String,
}

// Keep passwords out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("kind", &self.kind)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Parse `REG <username> <password>` or `AUTH <username> <password>`.
///
/// Fields are separated by any run of whitespace; the tag is
/// case-sensitive and exactly three fields are accepted.
pub fn parse_credentials(line: &str) -> Result<Credentials, CommandError> {
    let mut fields = line.split_whitespace();

    let kind = match fields.next() {
        None => return Err(CommandError::EmptyLine),
        Some("REG") => CredentialKind::Register,
        Some("AUTH") => CredentialKind::Authenticate,
        Some(other) => return Err(CommandError::UnknownCommand(other.to_string())),
    };

    let (Some(username), Some(password)) = (fields.next(), fields.next()) else {
        return Err(CommandError::MissingFields);
    };
    if fields.next().is_some() {
        return Err(CommandError::TrailingFields);
    }

    Ok(Credentials {
        kind,
        username: username.to_string(),
        password: password.to_string(),
    })
}

/// The client's answer to the room prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomChoice {
    /// `0`: create a new room.
    Create,
    /// A positive id: join that room.
    Join(SessionId),
}

/// Parse a room choice. Negative numbers and numbers outside the id range
/// are rejected the same way as non-numeric input.
pub fn parse_room_choice(line: &str) -> Result<RoomChoice, CommandError> {
    let input = line.trim();
    let invalid = || CommandError::InvalidSessionId(input.to_string());

    match input.parse::<i64>() {
        Ok(0) => Ok(RoomChoice::Create),
        Ok(n) => u32::try_from(n)
            .map(|id| RoomChoice::Join(SessionId::new(id)))
            .map_err(|_| invalid()),
        Err(_) => Err(invalid()),
    }
}
