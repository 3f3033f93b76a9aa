// Three-step login handshake.
//
// 1. Robot sends its username; server answers `107 KEY REQUEST`.
// 2. Robot sends a key id; server looks up the key pair and answers with
//    `(checksum * 1000 + server_key) mod 65536` as a bare decimal.
// 3. Robot answers with `(checksum * 1000 + client_key) mod 65536`; server
//    compares and answers `200 OK` (the session then issues the first move)
//    or `300 LOGIN FAILED`.
//
// `checksum` is the sum of the username's byte values. Robots that cannot
// put raw control bytes in a name spell them as the two-character escapes
// `\a`, `\b`, `\0`; each escape counts as the single control byte it names.
// The delimiter never contributes (the framer has already stripped it).
//
// Every failure is terminal and surfaces as a `SessionError`.

use robot_control_protocol::ServerMessage;
use robot_control_protocol::fields::{check_username, parse_confirmation, parse_key_id};
use tracing::debug;

use crate::error::SessionError;
use crate::keys::{KeyPair, KeyTable};

/// Sub-phase of the login handshake.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthPhase {
    AwaitUsername,
    AwaitKeyId,
    AwaitConfirmation,
    Authenticated,
}

/// What the handshake wants the session to do after a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthStep {
    /// Send this reply and keep authenticating.
    Reply(ServerMessage),
    /// Login succeeded.
    Authenticated,
}

#[derive(Debug)]
pub struct Authenticator {
    phase: AuthPhase,
    username: Vec<u8>,
    checksum: u64,
    key_pair: Option<KeyPair>,
}

impl Default for Authenticator {
    fn default() -> Self {
        Self::new()
    }
}

impl Authenticator {
    pub fn new() -> Self {
        Self {
            phase: AuthPhase::AwaitUsername,
            username: Vec::new(),
            checksum: 0,
            key_pair: None,
        }
    }

    pub fn phase(&self) -> AuthPhase {
        self.phase
    }

    pub fn username(&self) -> &[u8] {
        &self.username
    }

    /// Advance the handshake by one robot message.
    pub fn handle(&mut self, message: &[u8], keys: &KeyTable) -> Result<AuthStep, SessionError> {
        match self.phase {
            AuthPhase::AwaitUsername => {
                check_username(message)?;
                self.username = message.to_vec();
                self.checksum = username_checksum(message);
                self.phase = AuthPhase::AwaitKeyId;
                Ok(AuthStep::Reply(ServerMessage::KeyRequest))
            }
            AuthPhase::AwaitKeyId => {
                let key_id = parse_key_id(message)?;
                let pair = keys.lookup(key_id)?;
                self.key_pair = Some(pair);
                self.phase = AuthPhase::AwaitConfirmation;
                let server_hash = login_hash(self.checksum, pair.server);
                debug!(key_id, checksum = self.checksum, server_hash, "key accepted");
                Ok(AuthStep::Reply(ServerMessage::ServerConfirmation(server_hash)))
            }
            AuthPhase::AwaitConfirmation => {
                let confirmation = parse_confirmation(message)?;
                let pair = self
                    .key_pair
                    .ok_or(SessionError::Logic("confirmation before key id"))?;
                let expected = login_hash(self.checksum, pair.client);
                if confirmation != Some(i64::from(expected)) {
                    return Err(SessionError::LoginFailed);
                }
                self.phase = AuthPhase::Authenticated;
                Ok(AuthStep::Authenticated)
            }
            AuthPhase::Authenticated => Err(SessionError::Logic("login already complete")),
        }
    }
}

/// Sum of the username's byte values with `\a`, `\b`, `\0` escapes decoded.
pub fn username_checksum(username: &[u8]) -> u64 {
    let mut sum = 0u64;
    let mut i = 0;
    while i < username.len() {
        let escaped: Option<u64> = match (username[i], username.get(i + 1)) {
            (b'\\', Some(b'a')) => Some(0x07),
            (b'\\', Some(b'b')) => Some(0x08),
            (b'\\', Some(b'0')) => Some(0x00),
            _ => None,
        };
        match escaped {
            Some(byte) => {
                sum += byte;
                i += 2;
            }
            None => {
                sum += u64::from(username[i]);
                i += 1;
            }
        }
    }
    sum
}

/// `(checksum * 1000 + addend) mod 65536`.
pub fn login_hash(checksum: u64, addend: u32) -> u16 {
    let hash = (checksum.wrapping_mul(1000).wrapping_add(u64::from(addend))) % 65536;
    hash as u16
}
