//! Bounded line reading.

use std::borrow::Cow;
use std::fmt;
use std::io;
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use rylr_at::{LineCodec, Response, RECEIVE_MARKER};
use tracing::trace;

use crate::transport::{Transport, POLL_INTERVAL};

/// One line received from the module.
///
/// Never empty, never carries surrounding whitespace or line terminators.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawLine(Bytes);

impl RawLine {
    /// Build a line from text, trimming it. Returns `None` if nothing is left.
    pub fn new(text: impl AsRef<[u8]>) -> Option<RawLine> {
        let mut codec = LineCodec::new();
        codec.push(text.as_ref());
        codec.push(b"\n");
        codec.decode_line().map(RawLine)
    }

    /// The raw bytes of the line.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The line as text, with invalid UTF-8 replaced.
    pub fn as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }

    /// Classify the line.
    pub fn response(&self) -> Response {
        Response::parse(&self.0)
    }

    /// Whether the line announces an inbound message.
    pub fn is_inbound(&self) -> bool {
        self.0.starts_with(RECEIVE_MARKER.as_bytes())
    }
}

impl fmt::Display for RawLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

/// Turns transport bytes into lines, within a time budget.
///
/// Bytes of an unterminated line stay buffered between calls, so a line split
/// across reads (or across calls) is reassembled rather than lost.
#[derive(Debug, Default)]
pub struct LineReader {
    codec: LineCodec,
}

impl LineReader {
    /// Create a new line reader.
    pub fn new() -> Self {
        LineReader {
            codec: LineCodec::new(),
        }
    }

    /// Read lines until at least one is complete or `timeout` elapses.
    ///
    /// Returns every complete line read so far, in order. An empty result
    /// means nothing arrived in time; that is not an error.
    pub fn read_lines<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        timeout: Duration,
    ) -> io::Result<Vec<RawLine>> {
        let deadline = Instant::now() + timeout;
        loop {
            let lines: Vec<RawLine> = self.codec.decode_all().into_iter().map(RawLine).collect();
            if !lines.is_empty() {
                return Ok(lines);
            }

            let now = Instant::now();
            if now >= deadline {
                trace!(
                    "read_lines: timed out after {:?} ({} bytes pending)",
                    timeout,
                    self.codec.buffered_len()
                );
                return Ok(Vec::new());
            }

            if transport.wait_readable(deadline - now)? {
                let data = transport.read_available()?;
                if data.is_empty() {
                    thread::sleep(POLL_INTERVAL.min(deadline.saturating_duration_since(Instant::now())));
                } else {
                    trace!("read_lines: {} bytes", data.len());
                    self.codec.push(&data);
                }
            }
        }
    }

    /// Discard any partial line and everything the transport has pending.
    pub fn discard<T: Transport + ?Sized>(&mut self, transport: &mut T) -> io::Result<usize> {
        let stale = self.codec.buffered_len() + transport.read_available()?.len();
        self.codec.clear();
        Ok(stale)
    }

    /// Number of bytes held for an unterminated line.
    pub fn pending_len(&self) -> usize {
        self.codec.buffered_len()
    }
}
