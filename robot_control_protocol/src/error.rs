// Errors produced while framing or interpreting client input.
//
// Every variant here is a syntax-level problem: the server answers all of
// them with `301 SYNTAX ERROR` and closes the connection. Semantic failures
// (bad key id, wrong confirmation, unexpected recharge traffic) live in the
// server crate's `SessionError`.

use thiserror::Error;

/// Syntax-level protocol violations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("no delimiter within {max} bytes (have {got})")]
    FrameTooLong { max: usize, got: usize },

    #[error("{field} too long: max {max}, got {got}")]
    FieldTooLong {
        field: &'static str,
        max: usize,
        got: usize,
    },

    #[error("malformed {field}: {reason}")]
    Malformed {
        field: &'static str,
        reason: &'static str,
    },
}
