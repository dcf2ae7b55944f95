//! Error types for the connection layer.
//!
//! Store, registry and configuration errors live next to the code that
//! raises them (`db::DbError`, `state::RegistryError`, `config::ConfigError`).

use crate::replies;
use thiserror::Error;
use tokio_util::codec::LinesCodecError;

// ============================================================================
// Command Errors (protocol input)
// ============================================================================

/// A client line that could not be acted on.
///
/// Each variant maps to exactly one reply line. All but
/// [`CommandError::LineTooLong`] are recovered by re-prompting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("empty line")]
    EmptyLine,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("missing username or password")]
    MissingFields,

    #[error("unexpected trailing fields")]
    TrailingFields,

    #[error("invalid session id: {0}")]
    InvalidSessionId(String),

    #[error("line exceeds the maximum length")]
    LineTooLong,
}

impl CommandError {
    /// Static error code for log fields.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyLine => "empty_line",
            Self::UnknownCommand(_) => "unknown_command",
            Self::MissingFields => "missing_fields",
            Self::TrailingFields => "trailing_fields",
            Self::InvalidSessionId(_) => "invalid_session_id",
            Self::LineTooLong => "line_too_long",
        }
    }

    /// The line sent to the client.
    pub fn reply(&self) -> &'static str {
        match self {
            Self::EmptyLine | Self::UnknownCommand(_) | Self::MissingFields | Self::TrailingFields => {
                replies::INVALID_COMMAND_FORMAT
            }
            Self::InvalidSessionId(_) => replies::INVALID_SESSION_ID,
            Self::LineTooLong => replies::LINE_TOO_LONG,
        }
    }

    /// Whether the connection must be closed after the reply.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::LineTooLong)
    }
}

// ============================================================================
// Connection Errors (transport)
// ============================================================================

/// Transport failures. Terminal for the affected connection only.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] LinesCodecError),
}

impl ConnectionError {
    /// Peer went away without a protocol error (reset, broken pipe, EOF).
    pub fn is_disconnect(&self) -> bool {
        let io = match self {
            Self::Io(e) | Self::Codec(LinesCodecError::Io(e)) => e,
            Self::Codec(LinesCodecError::MaxLineLengthExceeded) => return false,
        };
        matches!(
            io.kind(),
            std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::BrokenPipe
                | std::io::ErrorKind::UnexpectedEof
        )
    }
}
