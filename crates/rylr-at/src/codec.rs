//! Line-based codec for AT communication.
//!
//! Commands are terminated with `\r\n`. The module terminates its output lines
//! the same way, but a single UART read may deliver half a line or several
//! lines at once, so received bytes are accumulated here until a line feed
//! completes a line.

use bytes::{Bytes, BytesMut};

/// Maximum length of a single received line.
///
/// The longest legitimate line is an inbound message announcement carrying a
/// full 240 byte payload, which stays well below this.
pub const MAX_LINE_LENGTH: usize = 512;

/// Line terminator appended to every command.
pub const LINE_TERMINATOR: &[u8] = b"\r\n";

/// A codec for reading and writing AT lines.
///
/// - Accumulates received bytes until a complete line is found
/// - Splits on line feed, trimming whitespace and carriage returns
/// - Skips lines that are empty after trimming
/// - Keeps an unterminated tail buffered for the next push
#[derive(Debug, Default)]
pub struct LineCodec {
    /// Buffer for accumulating incoming data.
    buffer: BytesMut,
}

impl LineCodec {
    /// Create a new line codec.
    pub fn new() -> Self {
        LineCodec {
            buffer: BytesMut::with_capacity(MAX_LINE_LENGTH * 2),
        }
    }

    /// Add received data to the buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode a complete line from the buffer.
    ///
    /// Returns the trimmed, non-empty line, or `None` if more data is needed.
    /// An unterminated run longer than [`MAX_LINE_LENGTH`] is discarded since
    /// it can never turn into a valid line.
    pub fn decode_line(&mut self) -> Option<Bytes> {
        while let Some(end) = self.buffer.iter().position(|&b| b == b'\n') {
            let segment = self.buffer.split_to(end + 1).freeze();
            let (start, stop) = trimmed_bounds(&segment);
            if start < stop {
                return Some(segment.slice(start..stop));
            }
        }

        if self.buffer.len() > MAX_LINE_LENGTH {
            log::warn!(
                "discarding {} unterminated bytes (line limit {})",
                self.buffer.len(),
                MAX_LINE_LENGTH
            );
            self.buffer.clear();
        }

        None
    }

    /// Decode every complete line currently buffered.
    pub fn decode_all(&mut self) -> Vec<Bytes> {
        let mut lines = Vec::new();
        while let Some(line) = self.decode_line() {
            lines.push(line);
        }
        lines
    }

    /// Encode a command for transmission.
    ///
    /// Appends the `\r\n` terminator.
    pub fn encode_command(cmd: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(cmd.len() + LINE_TERMINATOR.len());
        buf.extend_from_slice(cmd);
        buf.extend_from_slice(LINE_TERMINATOR);
        buf
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Get the current buffer contents as a string (for debugging).
    pub fn buffer_as_str(&self) -> String {
        String::from_utf8_lossy(&self.buffer).to_string()
    }
}

/// Bounds of `data` with leading and trailing ASCII whitespace removed.
fn trimmed_bounds(data: &[u8]) -> (usize, usize) {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    let stop = data
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    (start, stop)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_command() {
        let encoded = LineCodec::encode_command(b"AT+ADDRESS=86");
        assert_eq!(encoded, b"AT+ADDRESS=86\r\n");
    }

    #[test]
    fn test_decode_line() {
        let mut codec = LineCodec::new();
        codec.push(b"+OK\r\n");

        assert_eq!(codec.decode_line().as_deref(), Some(&b"+OK"[..]));
        assert!(codec.decode_line().is_none());
    }

    #[test]
    fn test_partial_line() {
        let mut codec = LineCodec::new();
        codec.push(b"+RCV=12,4,pi");

        assert!(codec.decode_line().is_none());
        assert_eq!(codec.buffered_len(), 12);

        codec.push(b"ng,-80,10\r\n");
        assert_eq!(
            codec.decode_line().as_deref(),
            Some(&b"+RCV=12,4,ping,-80,10"[..])
        );
    }

    #[test]
    fn test_multiple_lines_in_one_push() {
        let mut codec = LineCodec::new();
        codec.push(b"+OK\r\n\r\n  +READY \r\n+ERR=4\r\n+PAR");

        let lines = codec.decode_all();
        assert_eq!(lines.len(), 3);
        assert_eq!(&lines[0][..], b"+OK");
        assert_eq!(&lines[1][..], b"+READY");
        assert_eq!(&lines[2][..], b"+ERR=4");
        assert_eq!(codec.buffer_as_str(), "+PAR");
    }

    #[test]
    fn test_carriage_return_split_across_pushes() {
        let mut codec = LineCodec::new();
        codec.push(b"+OK\r");
        assert!(codec.decode_line().is_none());
        codec.push(b"\n");
        assert_eq!(codec.decode_line().as_deref(), Some(&b"+OK"[..]));
    }

    #[test]
    fn test_overlong_garbage_is_dropped() {
        let mut codec = LineCodec::new();
        codec.push(&[b'x'; MAX_LINE_LENGTH + 1]);
        assert!(codec.decode_line().is_none());
        assert_eq!(codec.buffered_len(), 0);

        codec.push(b"+OK\r\n");
        assert_eq!(codec.decode_line().as_deref(), Some(&b"+OK"[..]));
    }
}
