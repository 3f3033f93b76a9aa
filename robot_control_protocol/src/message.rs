// Protocol vocabulary for server-robot communication.
//
// `ServerMessage` is everything the server can say: fixed numeric-code
// replies (`102 MOVE`, `301 SYNTAX ERROR`, ...) plus the bare decimal hash it
// sends during login. Robot messages are free-form text whose meaning depends
// on the dialogue phase, so they are not modelled as an enum; `fields.rs`
// interprets them once the phase is known. The two phase-independent robot
// notifications and the per-field length limits are constants here.
//
// Limits count payload bytes only (the delimiter is not included).

use std::fmt;

use crate::types::Action;

/// Robot notification: the battery is low and the robot is recharging.
pub const RECHARGING: &[u8] = b"RECHARGING";

/// Robot notification: recharging finished.
pub const FULL_POWER: &[u8] = b"FULL POWER";

/// Maximum username length.
pub const USERNAME_MAX_LEN: usize = 20;

/// Maximum login confirmation length.
pub const CONFIRMATION_MAX_LEN: usize = 9;

/// Maximum coordinate report length, including the optional `OK ` prefix.
pub const COORDINATES_MAX_LEN: usize = 15;

/// Maximum secret length.
pub const SECRET_MAX_LEN: usize = 100;

/// Longest message a robot may legally send in any phase.
pub const MAX_MESSAGE_LEN: usize = SECRET_MAX_LEN;

/// Messages sent by the server to the robot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServerMessage {
    /// Login step 2: ask the robot for its key id.
    KeyRequest,
    /// Login step 3: the server's half of the checksum exchange.
    ServerConfirmation(u16),
    /// Login accepted.
    Ok,
    Move,
    TurnLeft,
    TurnRight,
    /// The robot is at the origin; ask for the secret.
    GetSecret,
    /// Secret received; the dialogue is over.
    Logout,
    LoginFailed,
    SyntaxError,
    LogicError,
    KeyOutOfRange,
}

impl ServerMessage {
    /// Numeric protocol code. The confirmation hash has none.
    pub fn code(&self) -> Option<u16> {
        let code = match self {
            ServerMessage::ServerConfirmation(_) => return None,
            ServerMessage::Move => 102,
            ServerMessage::TurnLeft => 103,
            ServerMessage::TurnRight => 104,
            ServerMessage::GetSecret => 105,
            ServerMessage::Logout => 106,
            ServerMessage::KeyRequest => 107,
            ServerMessage::Ok => 200,
            ServerMessage::LoginFailed => 300,
            ServerMessage::SyntaxError => 301,
            ServerMessage::LogicError => 302,
            ServerMessage::KeyOutOfRange => 303,
        };
        Some(code)
    }

    /// Payload bytes, without the delimiter.
    pub fn to_payload(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    /// Inverse of `From<Action>`, for clients decoding server commands.
    pub fn as_action(&self) -> Option<Action> {
        match self {
            ServerMessage::Move => Some(Action::Move),
            ServerMessage::TurnLeft => Some(Action::TurnLeft),
            ServerMessage::TurnRight => Some(Action::TurnRight),
            _ => None,
        }
    }

    /// Decode a server payload. Used by robot-side clients.
    pub fn parse(payload: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(payload).ok()?;
        let msg = match text {
            "102 MOVE" => ServerMessage::Move,
            "103 TURN LEFT" => ServerMessage::TurnLeft,
            "104 TURN RIGHT" => ServerMessage::TurnRight,
            "105 GET MESSAGE" => ServerMessage::GetSecret,
            "106 LOGOUT" => ServerMessage::Logout,
            "107 KEY REQUEST" => ServerMessage::KeyRequest,
            "200 OK" => ServerMessage::Ok,
            "300 LOGIN FAILED" => ServerMessage::LoginFailed,
            "301 SYNTAX ERROR" => ServerMessage::SyntaxError,
            "302 LOGIC ERROR" => ServerMessage::LogicError,
            "303 KEY OUT OF RANGE" => ServerMessage::KeyOutOfRange,
            digits => ServerMessage::ServerConfirmation(digits.parse().ok()?),
        };
        Some(msg)
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ServerMessage::ServerConfirmation(hash) => return write!(f, "{hash}"),
            ServerMessage::Move => "MOVE",
            ServerMessage::TurnLeft => "TURN LEFT",
            ServerMessage::TurnRight => "TURN RIGHT",
            ServerMessage::GetSecret => "GET MESSAGE",
            ServerMessage::Logout => "LOGOUT",
            ServerMessage::KeyRequest => "KEY REQUEST",
            ServerMessage::Ok => "OK",
            ServerMessage::LoginFailed => "LOGIN FAILED",
            ServerMessage::SyntaxError => "SYNTAX ERROR",
            ServerMessage::LogicError => "LOGIC ERROR",
            ServerMessage::KeyOutOfRange => "KEY OUT OF RANGE",
        };
        match self.code() {
            Some(code) => write!(f, "{code} {text}"),
            None => f.write_str(text),
        }
    }
}

impl From<Action> for ServerMessage {
    fn from(action: Action) -> Self {
        match action {
            Action::Move => ServerMessage::Move,
            Action::TurnLeft => ServerMessage::TurnLeft,
            Action::TurnRight => ServerMessage::TurnRight,
        }
    }
}
