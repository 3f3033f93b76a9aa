// TCP listener and per-connection handler.
//
// Architecture: thread per connection.
//
// - **Listener thread**: `TcpListener::accept()` in non-blocking mode, polling
//   the `keep_running` flag between attempts so `ServerHandle::stop()` can end
//   it. Each accepted stream gets its own thread.
// - **Connection threads**: run `serve_connection()` to completion inside an
//   `info_span!("connection", peer = ...)`. The only blocking point is the
//   deadline-bounded read. Connections share nothing but the read-only
//   `Arc<KeyTable>` and the timeouts.
//
// `serve_connection` is generic over `Transport` so tests can drive it
// without sockets. Per read it:
//
// 1. Feeds the bytes to the `Framer` and hands every complete message to the
//    `Session`, sending the replies in order.
// 2. Checks the leftover incomplete fragment against the longest message the
//    current phase allows, so an oversized message is rejected before its
//    delimiter arrives.
//
// The read deadline restarts after every complete message and uses the
// recharge timeout while the robot is recharging. A `SessionError` with a
// diagnostic is answered with that diagnostic; timeouts and peer EOF close
// silently.

use std::io::{self, Read};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use robot_control_protocol::{Framer, ProtocolError, write_message};
use tracing::{debug, info, info_span, warn};

use crate::config::{ServerConfig, Timeouts};
use crate::error::SessionError;
use crate::keys::KeyTable;
use crate::session::Session;

const READ_CHUNK: usize = 1024;
const ACCEPT_POLL: Duration = Duration::from_millis(50);
const LINGER: Duration = Duration::from_millis(200);

/// Byte stream to one robot.
pub trait Transport {
    /// Read available bytes, waiting at most `timeout`. `Ok(0)` means the
    /// peer closed; an expired wait is an error of kind `WouldBlock` or
    /// `TimedOut`.
    fn read_with_deadline(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;

    /// Send one message (the delimiter is appended).
    fn send(&mut self, payload: &[u8]) -> io::Result<()>;
}

impl Transport for TcpStream {
    fn read_with_deadline(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        self.set_read_timeout(Some(timeout))?;
        self.read(buf)
    }

    fn send(&mut self, payload: &[u8]) -> io::Result<()> {
        write_message(self, payload)
    }
}

/// Run one robot dialogue to completion. Returns the secret on a clean
/// logout.
pub fn serve_connection<T: Transport>(
    transport: &mut T,
    keys: Arc<KeyTable>,
    timeouts: Timeouts,
) -> Result<Vec<u8>, SessionError> {
    let mut session = Session::new(keys);
    match drive(transport, &mut session, &timeouts) {
        Ok(()) => Ok(session.into_secret().unwrap_or_default()),
        Err(err) => {
            if let Some(diagnostic) = err.diagnostic() {
                debug!(%diagnostic, "sending");
                if let Err(send_err) = transport.send(&diagnostic.to_payload()) {
                    debug!(%send_err, "could not deliver diagnostic");
                }
            }
            Err(err)
        }
    }
}

fn drive<T: Transport>(
    transport: &mut T,
    session: &mut Session,
    timeouts: &Timeouts,
) -> Result<(), SessionError> {
    let mut framer = Framer::default();
    let mut buf = [0u8; READ_CHUNK];
    let mut deadline = Instant::now() + session.read_timeout(timeouts);

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(SessionError::Timeout(session.read_timeout(timeouts)));
        }
        let n = match transport.read_with_deadline(&mut buf, remaining) {
            Ok(0) => return Err(SessionError::Closed),
            Ok(n) => n,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                return Err(SessionError::Timeout(session.read_timeout(timeouts)));
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };

        for frame in framer.feed(&buf[..n]) {
            let message = frame?;
            debug!(message = %String::from_utf8_lossy(&message), "received");
            for reply in session.handle_message(&message)? {
                debug!(%reply, "sending");
                transport.send(&reply.to_payload())?;
            }
            if session.is_finished() {
                return Ok(());
            }
            deadline = Instant::now() + session.read_timeout(timeouts);
        }

        let max = session.max_pending_len();
        let got = framer.pending().len();
        if got > max {
            return Err(ProtocolError::FieldTooLong {
                field: "message",
                max,
                got,
            }
            .into());
        }
    }
}

/// Handle returned by `start_server` to control the running listener.
pub struct ServerHandle {
    keep_running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ServerHandle {
    /// Stop accepting connections and wait for the listener to exit.
    /// Connections already in progress run to completion on their own.
    pub fn stop(mut self) {
        self.keep_running.store(false, Ordering::SeqCst);
        self.join();
    }

    /// Block until the listener exits (it only exits on a fatal accept error
    /// or after `stop`).
    pub fn wait(mut self) {
        self.join();
    }

    fn join(&mut self) {
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

/// Bind the listener and start accepting on a background thread. Returns a
/// handle for stopping it and the bound address (useful with port 0).
pub fn start_server(config: &ServerConfig) -> io::Result<(ServerHandle, SocketAddr)> {
    let listener = TcpListener::bind((config.bind_address.as_str(), config.port))?;
    let addr = listener.local_addr()?;
    listener.set_nonblocking(true)?;

    let keep_running = Arc::new(AtomicBool::new(true));
    let keep_running_listener = keep_running.clone();
    let keys = Arc::new(config.keys.clone());
    let timeouts = config.timeouts();

    let thread = thread::spawn(move || {
        accept_loop(listener, keys, timeouts, keep_running_listener);
    });
    info!(%addr, "listening");

    Ok((
        ServerHandle {
            keep_running,
            thread: Some(thread),
        },
        addr,
    ))
}

fn accept_loop(
    listener: TcpListener,
    keys: Arc<KeyTable>,
    timeouts: Timeouts,
    keep_running: Arc<AtomicBool>,
) {
    while keep_running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                let keys = keys.clone();
                thread::spawn(move || handle_connection(stream, peer, keys, timeouts));
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL);
            }
            Err(e) => {
                warn!(error = %e, "accept failed, listener exiting");
                break;
            }
        }
    }
    info!("listener stopped");
}

fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    keys: Arc<KeyTable>,
    timeouts: Timeouts,
) {
    let span = info_span!("connection", %peer);
    let _enter = span.enter();
    info!("accepted");

    if let Err(e) = stream.set_nonblocking(false) {
        warn!(error = %e, "cannot switch stream to blocking mode");
        return;
    }

    match serve_connection(&mut stream, keys, timeouts) {
        Ok(secret) => {
            debug!(secret = %String::from_utf8_lossy(&secret), "secret received");
            info!(secret_len = secret.len(), "logged out");
        }
        Err(err @ (SessionError::Timeout(_) | SessionError::Closed)) => info!(%err, "closing"),
        Err(err @ SessionError::Transport(_)) => warn!(%err, "closing"),
        Err(err) => warn!(%err, "protocol violation, closing"),
    }
    close_gracefully(stream);
}

/// Half-close, then discard input for a short while. Closing with unread
/// input pending resets the connection, which can drop the final reply.
fn close_gracefully(mut stream: TcpStream) {
    if stream.shutdown(Shutdown::Write).is_err() {
        return;
    }
    if stream.set_read_timeout(Some(LINGER)).is_err() {
        return;
    }
    let until = Instant::now() + LINGER;
    let mut buf = [0u8; READ_CHUNK];
    while Instant::now() < until {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use robot_control_protocol::{DELIMITER, FULL_POWER, RECHARGING, ServerMessage};

    use super::*;

    /// Scripted inbound chunks; records everything sent. Once the script is
    /// exhausted, reads either time out or hit EOF.
    #[derive(Default)]
    struct MockTransport {
        inbound: VecDeque<Vec<u8>>,
        sent: Vec<Vec<u8>>,
        eof_when_drained: bool,
    }

    impl MockTransport {
        fn with_chunks(chunks: &[&[u8]]) -> Self {
            Self {
                inbound: chunks.iter().map(|c| c.to_vec()).collect(),
                ..Self::default()
            }
        }

        fn with_messages(messages: &[&[u8]]) -> Self {
            let mut wire = Vec::new();
            for message in messages {
                wire.extend_from_slice(message);
                wire.extend_from_slice(&DELIMITER);
            }
            Self::with_chunks(&[&wire])
        }

        fn sent(&self) -> Vec<ServerMessage> {
            self.sent
                .iter()
                .map(|payload| ServerMessage::parse(payload).unwrap())
                .collect()
        }
    }

    impl Transport for MockTransport {
        fn read_with_deadline(&mut self, buf: &mut [u8], _timeout: Duration) -> io::Result<usize> {
            match self.inbound.pop_front() {
                Some(chunk) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        self.inbound.push_front(chunk[n..].to_vec());
                    }
                    Ok(n)
                }
                None if self.eof_when_drained => Ok(0),
                None => Err(io::ErrorKind::WouldBlock.into()),
            }
        }

        fn send(&mut self, payload: &[u8]) -> io::Result<()> {
            self.sent.push(payload.to_vec());
            Ok(())
        }
    }

    fn serve(transport: &mut MockTransport) -> Result<Vec<u8>, SessionError> {
        serve_connection(
            transport,
            Arc::new(KeyTable::reference()),
            ServerConfig::default().timeouts(),
        )
    }

    const LOGIN: [&[u8]; 3] = [b"Mark", b"0", b"33821"];

    #[test]
    fn full_dialogue_over_one_chunk() {
        let mut t = MockTransport::with_messages(&[
            LOGIN[0], LOGIN[1], LOGIN[2], b"OK 2 0", b"OK 1 0", b"OK 0 0", b"secret",
        ]);
        assert_eq!(serve(&mut t).unwrap(), b"secret");
        assert_eq!(
            t.sent(),
            vec![
                ServerMessage::KeyRequest,
                ServerMessage::ServerConfirmation(24803),
                ServerMessage::Ok,
                ServerMessage::Move,
                ServerMessage::Move,
                ServerMessage::Move,
                ServerMessage::GetSecret,
                ServerMessage::Logout,
            ]
        );
        assert_eq!(t.sent[1], b"24803");
    }

    #[test]
    fn delimiter_split_across_reads() {
        let mut t = MockTransport::with_chunks(&[b"Ma", b"rk\x07", b"\x08", b"0\x07\x08338", b"21\x07"]);
        t.inbound.push_back(b"\x08".to_vec());
        t.eof_when_drained = true;
        assert!(matches!(serve(&mut t), Err(SessionError::Closed)));
        assert_eq!(
            t.sent(),
            vec![
                ServerMessage::KeyRequest,
                ServerMessage::ServerConfirmation(24803),
                ServerMessage::Ok,
                ServerMessage::Move,
            ]
        );
    }

    #[test]
    fn long_username_rejected_before_delimiter() {
        let mut t = MockTransport::with_chunks(&[&[b'n'; 21]]);
        assert!(matches!(serve(&mut t), Err(SessionError::Syntax(_))));
        assert_eq!(t.sent(), vec![ServerMessage::SyntaxError]);
    }

    #[test]
    fn recharge_fragment_fits_the_early_check() {
        // "RECHARGING" is longer than a confirmation but must not trip the
        // early check while it is still arriving.
        let mut t = MockTransport::with_chunks(&[b"Mark\x07\x080\x07\x08RECHARGING", b"\x07\x08"]);
        assert!(matches!(serve(&mut t), Err(SessionError::Timeout(_))));
        assert_eq!(
            t.sent(),
            vec![
                ServerMessage::KeyRequest,
                ServerMessage::ServerConfirmation(24803)
            ]
        );
    }

    #[test]
    fn only_full_power_fits_while_recharging() {
        let mut t = MockTransport::with_chunks(&[
            b"Mark\x07\x080\x07\x08",
            b"33821\x07\x08RECHARGING\x07\x08FULL POWER!",
        ]);
        assert!(matches!(serve(&mut t), Err(SessionError::Syntax(_))));
        assert_eq!(t.sent().last(), Some(&ServerMessage::SyntaxError));
    }

    #[test]
    fn silent_timeout() {
        let mut t = MockTransport::with_messages(&[b"Mark"]);
        assert!(matches!(serve(&mut t), Err(SessionError::Timeout(d)) if d == Duration::from_secs(1)));
        assert_eq!(t.sent(), vec![ServerMessage::KeyRequest]);
    }

    #[test]
    fn recharging_extends_timeout() {
        let mut t = MockTransport::with_messages(&[b"Mark", RECHARGING]);
        assert!(matches!(serve(&mut t), Err(SessionError::Timeout(d)) if d == Duration::from_secs(5)));
    }

    #[test]
    fn recharge_interrupts_navigation() {
        let mut t = MockTransport::with_messages(&[
            LOGIN[0], LOGIN[1], LOGIN[2], b"OK 0 2", RECHARGING, FULL_POWER, b"OK 0 1",
            b"OK 0 0", b"x",
        ]);
        assert_eq!(serve(&mut t).unwrap(), b"x");
        assert_eq!(
            t.sent()[3..],
            [
                ServerMessage::Move,
                ServerMessage::Move,
                ServerMessage::Move,
                ServerMessage::GetSecret,
                ServerMessage::Logout,
            ]
        );
    }

    #[test]
    fn logic_error_while_recharging() {
        let mut t = MockTransport::with_messages(&[b"Mark", RECHARGING, b"0"]);
        assert!(matches!(serve(&mut t), Err(SessionError::Logic(_))));
        assert_eq!(
            t.sent(),
            vec![ServerMessage::KeyRequest, ServerMessage::LogicError]
        );
    }

    #[test]
    fn key_out_of_range_and_login_failed() {
        let mut t = MockTransport::with_messages(&[b"Mark", b"7"]);
        assert!(matches!(serve(&mut t), Err(SessionError::KeyOutOfRange(_))));
        assert_eq!(t.sent().last(), Some(&ServerMessage::KeyOutOfRange));

        let mut t = MockTransport::with_messages(&[b"Mark", b"0", b"33822"]);
        assert!(matches!(serve(&mut t), Err(SessionError::LoginFailed)));
        assert_eq!(t.sent().last(), Some(&ServerMessage::LoginFailed));
    }

    #[test]
    fn oversized_secret_gets_syntax_error_without_logout() {
        let secret = vec![b's'; 101];
        let mut t =
            MockTransport::with_messages(&[LOGIN[0], LOGIN[1], LOGIN[2], b"OK 0 0", secret.as_slice()]);
        assert!(matches!(serve(&mut t), Err(SessionError::Syntax(_))));
        let sent = t.sent();
        assert_eq!(sent.last(), Some(&ServerMessage::SyntaxError));
        assert!(!sent.contains(&ServerMessage::Logout));
    }
}
