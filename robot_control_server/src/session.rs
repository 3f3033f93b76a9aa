// Per-connection dialogue state machine.
//
// A `Session` consumes one complete robot message at a time and answers with
// the server messages to send back (zero, one or two of them). It owns the
// `Authenticator` and the `Navigator` and routes each message by phase:
//
//   Authenticating -> Navigating -> AwaitingSecret -> LoggedOut
//
// The move from Navigating to AwaitingSecret happens on the report that puts
// the robot on the origin; that report is answered with `105 GET MESSAGE`
// instead of a move.
//
// Recharging is an overlay, not a phase. `RECHARGING` in any phase before
// logout suspends the dialogue without a reply; the next message must be
// `FULL POWER`, which resumes exactly where it stopped (again without a
// reply). The recharge check runs before any phase-specific validation, so a
// username like `RECHARGING` is a recharge notification, not a username.
//
// Errors are returned, never sent: the connection handler (`server.rs`) turns
// a `SessionError` into its diagnostic and closes.

use std::sync::Arc;
use std::time::Duration;

use robot_control_protocol::fields::{check_secret, parse_coordinates};
use robot_control_protocol::message::{
    CONFIRMATION_MAX_LEN, COORDINATES_MAX_LEN, SECRET_MAX_LEN, USERNAME_MAX_LEN,
};
use robot_control_protocol::{FULL_POWER, MAX_MESSAGE_LEN, RECHARGING, ServerMessage};
use tracing::{debug, info};

use crate::auth::{AuthPhase, AuthStep, Authenticator};
use crate::config::Timeouts;
use crate::error::SessionError;
use crate::keys::KeyTable;
use crate::navigator::{NavStep, Navigator};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Authenticating,
    Navigating,
    AwaitingSecret,
    LoggedOut,
}

#[derive(Debug)]
pub struct Session {
    phase: Phase,
    auth: Authenticator,
    navigator: Navigator,
    recharging: bool,
    secret: Option<Vec<u8>>,
    keys: Arc<KeyTable>,
}

impl Session {
    pub fn new(keys: Arc<KeyTable>) -> Self {
        Self {
            phase: Phase::Authenticating,
            auth: Authenticator::new(),
            navigator: Navigator::new(),
            recharging: false,
            secret: None,
            keys,
        }
    }

    /// Process one complete robot message and return the replies, in order.
    pub fn handle_message(&mut self, message: &[u8]) -> Result<Vec<ServerMessage>, SessionError> {
        if self.phase == Phase::LoggedOut {
            return Err(SessionError::Logic("message after logout"));
        }

        if self.recharging {
            if message == FULL_POWER {
                debug!("recharge finished");
                self.recharging = false;
                return Ok(Vec::new());
            }
            return Err(SessionError::Logic("expected FULL POWER while recharging"));
        }
        if message == RECHARGING {
            debug!(phase = ?self.phase, "robot recharging");
            self.recharging = true;
            return Ok(Vec::new());
        }
        if message == FULL_POWER {
            return Err(SessionError::Logic("FULL POWER without RECHARGING"));
        }

        match self.phase {
            Phase::Authenticating => self.authenticate(message),
            Phase::Navigating => self.navigate(message),
            Phase::AwaitingSecret => self.receive_secret(message),
            Phase::LoggedOut => Err(SessionError::Logic("message after logout")),
        }
    }

    fn authenticate(&mut self, message: &[u8]) -> Result<Vec<ServerMessage>, SessionError> {
        match self.auth.handle(message, &self.keys)? {
            AuthStep::Reply(reply) => Ok(vec![reply]),
            AuthStep::Authenticated => {
                info!(
                    username = %String::from_utf8_lossy(self.auth.username()),
                    "login succeeded"
                );
                self.phase = Phase::Navigating;
                let first = self.navigator.start();
                Ok(vec![ServerMessage::Ok, first.into()])
            }
        }
    }

    fn navigate(&mut self, message: &[u8]) -> Result<Vec<ServerMessage>, SessionError> {
        let position = parse_coordinates(message)?;
        match self.navigator.observe(position) {
            NavStep::Act(action) => {
                debug!(%position, ?action, facing = ?self.navigator.facing(), "navigating");
                Ok(vec![action.into()])
            }
            NavStep::Arrived => {
                info!("robot reached the origin");
                self.phase = Phase::AwaitingSecret;
                Ok(vec![ServerMessage::GetSecret])
            }
        }
    }

    fn receive_secret(&mut self, message: &[u8]) -> Result<Vec<ServerMessage>, SessionError> {
        check_secret(message)?;
        self.secret = Some(message.to_vec());
        self.phase = Phase::LoggedOut;
        Ok(vec![ServerMessage::Logout])
    }

    /// How long to wait for the next message.
    pub fn read_timeout(&self, timeouts: &Timeouts) -> Duration {
        if self.recharging {
            timeouts.recharging
        } else {
            timeouts.normal
        }
    }

    /// Longest incomplete message that could still be legal in the current
    /// phase. The recharge notifications are legal everywhere; while
    /// recharging only `FULL POWER` is.
    pub fn max_pending_len(&self) -> usize {
        if self.recharging {
            return FULL_POWER.len();
        }
        let field_limit = match self.phase {
            Phase::Authenticating => match self.auth.phase() {
                AuthPhase::AwaitUsername => USERNAME_MAX_LEN,
                AuthPhase::AwaitConfirmation => CONFIRMATION_MAX_LEN,
                AuthPhase::AwaitKeyId | AuthPhase::Authenticated => MAX_MESSAGE_LEN,
            },
            Phase::Navigating => COORDINATES_MAX_LEN,
            Phase::AwaitingSecret => SECRET_MAX_LEN,
            Phase::LoggedOut => MAX_MESSAGE_LEN,
        };
        field_limit.max(RECHARGING.len()).max(FULL_POWER.len())
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_recharging(&self) -> bool {
        self.recharging
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::LoggedOut
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn secret(&self) -> Option<&[u8]> {
        self.secret.as_deref()
    }

    pub fn into_secret(self) -> Option<Vec<u8>> {
        self.secret
    }
}

#[cfg(test)]
mod tests {
    use robot_control_protocol::Direction;

    use super::*;

    fn session() -> Session {
        Session::new(Arc::new(KeyTable::reference()))
    }

    /// Log in as Mark with key 0 and return the session in the Navigating phase.
    fn logged_in() -> Session {
        let mut s = session();
        assert_eq!(s.handle_message(b"Mark").unwrap(), vec![ServerMessage::KeyRequest]);
        assert_eq!(
            s.handle_message(b"0").unwrap(),
            vec![ServerMessage::ServerConfirmation(24803)]
        );
        assert_eq!(
            s.handle_message(b"33821").unwrap(),
            vec![ServerMessage::Ok, ServerMessage::Move]
        );
        assert_eq!(s.phase(), Phase::Navigating);
        s
    }

    #[test]
    fn full_dialogue() {
        let mut s = logged_in();
        assert_eq!(s.handle_message(b"OK 2 0").unwrap(), vec![ServerMessage::Move]);
        assert_eq!(s.handle_message(b"OK 1 0").unwrap(), vec![ServerMessage::Move]);
        assert_eq!(
            s.handle_message(b"OK 0 0").unwrap(),
            vec![ServerMessage::GetSecret]
        );
        assert_eq!(s.phase(), Phase::AwaitingSecret);
        assert_eq!(
            s.handle_message(b"Tajny vzkaz.").unwrap(),
            vec![ServerMessage::Logout]
        );
        assert!(s.is_finished());
        assert_eq!(s.secret(), Some(&b"Tajny vzkaz."[..]));
    }

    #[test]
    fn recharge_preserves_navigation_state() {
        let mut s = logged_in();
        s.handle_message(b"OK 4 2").unwrap();
        s.handle_message(b"OK 3 2").unwrap();
        let before = s.navigator().clone();
        assert_eq!(before.facing(), Some(Direction::Left));

        assert!(s.handle_message(RECHARGING).unwrap().is_empty());
        assert!(s.is_recharging());
        assert!(s.handle_message(FULL_POWER).unwrap().is_empty());
        assert!(!s.is_recharging());

        assert_eq!(s.navigator(), &before);
        assert_eq!(s.phase(), Phase::Navigating);
        assert_eq!(s.handle_message(b"OK 2 2").unwrap(), vec![ServerMessage::Move]);
    }

    #[test]
    fn recharge_during_login() {
        let mut s = session();
        s.handle_message(b"Mark").unwrap();
        assert!(s.handle_message(RECHARGING).unwrap().is_empty());
        assert!(s.handle_message(FULL_POWER).unwrap().is_empty());
        assert_eq!(
            s.handle_message(b"0").unwrap(),
            vec![ServerMessage::ServerConfirmation(24803)]
        );
    }

    #[test]
    fn anything_but_full_power_while_recharging_is_logic_error() {
        let mut s = logged_in();
        s.handle_message(RECHARGING).unwrap();
        let err = s.handle_message(b"OK 1 1").unwrap_err();
        assert_eq!(err.diagnostic(), Some(ServerMessage::LogicError));
    }

    #[test]
    fn full_power_without_recharging_is_logic_error() {
        let mut s = session();
        let err = s.handle_message(FULL_POWER).unwrap_err();
        assert_eq!(err.diagnostic(), Some(ServerMessage::LogicError));
    }

    #[test]
    fn oversized_secret_is_syntax_error() {
        let mut s = logged_in();
        s.handle_message(b"OK 0 0").unwrap();
        let err = s.handle_message(&[b's'; 101]).unwrap_err();
        assert_eq!(err.diagnostic(), Some(ServerMessage::SyntaxError));
        assert!(!s.is_finished());
        assert_eq!(s.secret(), None);
    }

    #[test]
    fn secret_at_limit_is_accepted() {
        let mut s = logged_in();
        s.handle_message(b"0 0").unwrap();
        assert_eq!(
            s.handle_message(&[b's'; 100]).unwrap(),
            vec![ServerMessage::Logout]
        );
        assert_eq!(s.into_secret().map(|secret| secret.len()), Some(100));
    }

    #[test]
    fn malformed_coordinates() {
        for bad in [&b"OK 1.5 2"[..], b"OK 1  2", b"1", b"OK 1 2 3", b"OK 123456 1234567"] {
            let mut s = logged_in();
            let err = s.handle_message(bad).unwrap_err();
            assert_eq!(
                err.diagnostic(),
                Some(ServerMessage::SyntaxError),
                "{}",
                String::from_utf8_lossy(bad)
            );
        }
    }

    #[test]
    fn pending_limits_follow_phase() {
        let mut s = session();
        assert_eq!(s.max_pending_len(), 20);
        s.handle_message(b"Mark").unwrap();
        assert_eq!(s.max_pending_len(), MAX_MESSAGE_LEN);
        s.handle_message(b"0").unwrap();
        assert_eq!(s.max_pending_len(), 10);
        s.handle_message(b"33821").unwrap();
        assert_eq!(s.max_pending_len(), 15);
        s.handle_message(b"0 0").unwrap();
        assert_eq!(s.max_pending_len(), 100);
        s.handle_message(RECHARGING).unwrap();
        assert_eq!(s.max_pending_len(), FULL_POWER.len());
    }

    #[test]
    fn read_timeout_stretches_while_recharging() {
        let timeouts = Timeouts {
            normal: Duration::from_secs(1),
            recharging: Duration::from_secs(5),
        };
        let mut s = session();
        assert_eq!(s.read_timeout(&timeouts), Duration::from_secs(1));
        s.handle_message(RECHARGING).unwrap();
        assert_eq!(s.read_timeout(&timeouts), Duration::from_secs(5));
        s.handle_message(FULL_POWER).unwrap();
        assert_eq!(s.read_timeout(&timeouts), Duration::from_secs(1));
    }
}
