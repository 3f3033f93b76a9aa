// Delimiter-terminated message framing over a byte stream.
//
// Every message, in both directions, is an arbitrary byte run terminated by
// the two-byte delimiter `BEL BS` (`\x07\x08`). TCP gives no alignment
// between reads and messages: one read may hold several messages, half a
// message, or a message whose delimiter is split across two reads.
//
// `Framer` owns the residual buffer for one connection. `feed()` appends a
// chunk and returns `Frames`, a lazy iterator that yields each complete
// message with the delimiter stripped. Anything after the last delimiter
// stays buffered for the next `feed()`. The scan cursor remembers how far the
// buffer is known to be delimiter-free, so bytes are never rescanned (except
// a trailing BEL, which may be the first half of a delimiter).
//
// `max_len` bounds the pre-delimiter length. A message (or buffered fragment)
// longer than that yields `ProtocolError::FrameTooLong` once, after which the
// framer is poisoned and yields nothing more: the connection is about to be
// closed anyway.
//
// `write_message` is the outbound half: payload, delimiter, flush.

use std::io::{self, Write};

use crate::error::ProtocolError;
use crate::message::MAX_MESSAGE_LEN;

/// Message terminator: BEL, BS.
pub const DELIMITER: [u8; 2] = [0x07, 0x08];

/// Incremental splitter for one connection's inbound byte stream.
#[derive(Debug)]
pub struct Framer {
    buffer: Vec<u8>,
    /// First byte not yet returned as part of a message.
    start: usize,
    /// No delimiter begins before this index. Always `>= start`.
    scanned: usize,
    max_len: usize,
    poisoned: bool,
}

impl Default for Framer {
    fn default() -> Self {
        Self::new(MAX_MESSAGE_LEN)
    }
}

impl Framer {
    pub fn new(max_len: usize) -> Self {
        Self {
            buffer: Vec::new(),
            start: 0,
            scanned: 0,
            max_len,
            poisoned: false,
        }
    }

    /// Append `chunk` and iterate the messages it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Frames<'_> {
        self.compact();
        self.buffer.extend_from_slice(chunk);
        Frames { framer: self }
    }

    /// The buffered incomplete message, excluding a trailing BEL that may be
    /// the start of a delimiter. Only meaningful once `Frames` is exhausted.
    pub fn pending(&self) -> &[u8] {
        let rest = &self.buffer[self.start..];
        match rest.last() {
            Some(&last) if last == DELIMITER[0] => &rest[..rest.len() - 1],
            _ => rest,
        }
    }

    /// Drop already-returned bytes from the front of the buffer.
    fn compact(&mut self) {
        if self.start > 0 {
            self.buffer.drain(..self.start);
            self.scanned -= self.start;
            self.start = 0;
        }
    }

    fn next_frame(&mut self) -> Option<Result<Vec<u8>, ProtocolError>> {
        if self.poisoned {
            return None;
        }
        let found = self.buffer[self.scanned..]
            .windows(DELIMITER.len())
            .position(|w| w == DELIMITER.as_slice());
        match found {
            Some(offset) => {
                let end = self.scanned + offset;
                let len = end - self.start;
                if len > self.max_len {
                    return Some(Err(self.poison(len)));
                }
                let message = self.buffer[self.start..end].to_vec();
                self.start = end + DELIMITER.len();
                self.scanned = self.start;
                Some(Ok(message))
            }
            None => {
                // The final byte may be completed into a delimiter by the next chunk.
                self.scanned = self.buffer.len().saturating_sub(1).max(self.start);
                let got = self.pending().len();
                if got > self.max_len {
                    return Some(Err(self.poison(got)));
                }
                None
            }
        }
    }

    fn poison(&mut self, got: usize) -> ProtocolError {
        self.poisoned = true;
        ProtocolError::FrameTooLong {
            max: self.max_len,
            got,
        }
    }
}

/// Lazy iterator over the messages completed by one `Framer::feed` call.
pub struct Frames<'a> {
    framer: &'a mut Framer,
}

impl Iterator for Frames<'_> {
    type Item = Result<Vec<u8>, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.framer.next_frame()
    }
}

/// Write one delimiter-terminated message and flush.
pub fn write_message<W: Write>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
    writer.write_all(payload)?;
    writer.write_all(&DELIMITER)?;
    writer.flush()
}
