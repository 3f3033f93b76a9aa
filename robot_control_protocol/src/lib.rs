// robot_control_protocol — wire protocol between the control server and robots.
//
// This crate defines the message vocabulary, field parsing, and framing used
// by the control server (`robot_control_server`) and by anything that speaks
// the robot side of the protocol (test clients, simulators). It has no
// networking or threading of its own.
//
// Module overview:
// - `types.rs`:    Grid value types: `Position`, `Direction`, `Action`.
// - `message.rs`:  `ServerMessage` (numeric-code replies), robot notification
//                  constants, per-field length limits.
// - `fields.rs`:   Phase-specific parsing of robot messages: key id, login
//                  confirmation, coordinate reports, length checks.
// - `framing.rs`:  `BEL BS`-delimited framing: `Framer` for the inbound
//                  stream, `write_message` for the outbound side.
// - `error.rs`:    `ProtocolError`, the syntax-level failure type.
//
// Design decisions:
// - **Text protocol, byte payloads.** Robots may send arbitrary bytes (the
//   username and secret are opaque), so payloads are `Vec<u8>` and only
//   decoded as text where a field demands it.
// - **No async runtime.** Framing is plain buffer manipulation; the server
//   drives it from blocking reads.

pub mod error;
pub mod fields;
pub mod framing;
pub mod message;
pub mod types;

pub use error::ProtocolError;
pub use framing::{DELIMITER, Framer, Frames, write_message};
pub use message::{FULL_POWER, MAX_MESSAGE_LEN, RECHARGING, ServerMessage};
pub use types::{Action, Direction, Position};
