// Connection-fatal errors.
//
// The protocol has a one-strike policy: any violation ends the connection.
// `SessionError` enumerates every way a dialogue can end other than a clean
// logout. Most variants carry a diagnostic the server sends before closing
// (`diagnostic()`); timeouts and transport failures close silently.

use std::io;

use robot_control_protocol::{ProtocolError, ServerMessage};
use thiserror::Error;

use crate::keys::KeyOutOfRange;

#[derive(Debug, Error)]
pub enum SessionError {
    /// Framing, length or format violation in any field.
    #[error("syntax error: {0}")]
    Syntax(#[from] ProtocolError),

    #[error(transparent)]
    KeyOutOfRange(#[from] KeyOutOfRange),

    #[error("login failed: confirmation does not match")]
    LoginFailed,

    /// Unexpected traffic around a recharge.
    #[error("logic error: {0}")]
    Logic(&'static str),

    #[error("no message within {0:?}")]
    Timeout(std::time::Duration),

    #[error("peer closed the connection")]
    Closed,

    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
}

impl SessionError {
    /// The message sent to the robot before closing, if any.
    pub fn diagnostic(&self) -> Option<ServerMessage> {
        match self {
            SessionError::Syntax(_) => Some(ServerMessage::SyntaxError),
            SessionError::KeyOutOfRange(_) => Some(ServerMessage::KeyOutOfRange),
            SessionError::LoginFailed => Some(ServerMessage::LoginFailed),
            SessionError::Logic(_) => Some(ServerMessage::LogicError),
            SessionError::Timeout(_) | SessionError::Closed | SessionError::Transport(_) => None,
        }
    }
}
