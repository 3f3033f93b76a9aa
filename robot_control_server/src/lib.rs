// robot_control_server — control server that logs robots in, guides them to
// the origin, and collects their secret.
//
// Each robot connects over TCP and speaks the text protocol defined in
// `robot_control_protocol`. The server authenticates it with a checksum
// handshake, then steers it toward `(0, 0)` using only the coordinate
// reports that follow each command. Once there it asks for the secret
// message and logs the robot out. Any protocol violation ends the connection
// with a diagnostic.
//
// Module overview:
// - `server.rs`:    TCP listener, thread-per-connection handler, the
//                   `Transport` seam, early message-length check, timeouts.
// - `session.rs`:   Dialogue state machine for one connection; routes each
//                   message by phase and handles the recharge overlay.
// - `auth.rs`:      Three-step login handshake and checksum hashing.
// - `navigator.rs`: Facing inference, obstacle detours, heading choice.
// - `keys.rs`:      Key id -> key pair table shared by all connections.
// - `config.rs`:    `ServerConfig` (JSON file + defaults) and `Timeouts`.
// - `error.rs`:     `SessionError` and its mapping to diagnostic replies.
// - `logging.rs`:   `tracing-subscriber` setup for the binary.
//
// Dependencies: `robot_control_protocol` for framing and message types.
//
// The server runs as a standalone binary (`main.rs`) or can be embedded via
// `start_server`, which is how the integration tests drive it.

pub mod auth;
pub mod config;
pub mod error;
pub mod keys;
pub mod logging;
pub mod navigator;
pub mod server;
pub mod session;

pub use config::ServerConfig;
pub use server::{ServerHandle, Transport, serve_connection, start_server};
