//! Radio message types.
//!
//! An inbound message is announced by the module as a single line:
//!
//! ```text
//! +RCV=<sender>,<length>,<payload>,<rssi>,<snr>
//! ```
//!
//! `payload` is exactly `length` raw bytes and may contain commas, so it is
//! sliced by the declared length and only the remainder is split on commas.
//! Outbound messages are sent with `AT+SEND=<destination>,<length>,<payload>`.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};

/// Marker token announcing an inbound message.
pub const RECEIVE_MARKER: &str = "+RCV";

/// Largest payload the module can carry in one message.
pub const MAX_PAYLOAD_LEN: usize = 240;

/// A module address (`AT+ADDRESS`). Address 0 broadcasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(u16);

impl Address {
    /// Broadcast address.
    pub const BROADCAST: Address = Address(0);

    /// Create an address.
    pub const fn new(value: u16) -> Self {
        Address(value)
    }

    /// The numeric address.
    pub const fn value(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Address {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Address)
    }
}

impl From<u16> for Address {
    fn from(value: u16) -> Self {
        Address(value)
    }
}

// ============================================================================
// Inbound
// ============================================================================

/// A message received over the air, decoded from a `+RCV` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    sender: Address,
    payload: Vec<u8>,
    rssi: i16,
    snr: i16,
}

impl InboundMessage {
    /// Create an inbound message record.
    ///
    /// Fails if the payload is longer than [`MAX_PAYLOAD_LEN`].
    pub fn new(
        sender: Address,
        payload: impl Into<Vec<u8>>,
        rssi: i16,
        snr: i16,
    ) -> ProtocolResult<Self> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(ProtocolError::PayloadTooLong {
                max: MAX_PAYLOAD_LEN,
                actual: payload.len(),
            });
        }
        Ok(InboundMessage {
            sender,
            payload,
            rssi,
            snr,
        })
    }

    /// Decode a received line.
    ///
    /// Returns `Ok(None)` for lines that do not start with [`RECEIVE_MARKER`].
    /// A line that carries the marker but cannot be decoded is a
    /// [`ProtocolError::Framing`] error.
    pub fn decode(line: impl AsRef<[u8]>) -> ProtocolResult<Option<InboundMessage>> {
        let line = line.as_ref();
        let Some(body) = line.strip_prefix(RECEIVE_MARKER.as_bytes()) else {
            return Ok(None);
        };
        let body = body
            .strip_prefix(b"=")
            .ok_or_else(|| framing("missing '=' after marker"))?;

        let (sender, rest) = split_field(body).ok_or_else(|| framing("missing sender"))?;
        let sender: Address = digits(sender)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| framing(format!("invalid sender {:?}", lossy(sender))))?;

        let (length, rest) =
            split_field(rest).ok_or_else(|| framing("missing payload length"))?;
        let length: usize = digits(length)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| framing(format!("invalid payload length {:?}", lossy(length))))?;
        if length > MAX_PAYLOAD_LEN {
            return Err(framing(format!(
                "declared length {} exceeds maximum {}",
                length, MAX_PAYLOAD_LEN
            )));
        }
        if rest.len() < length {
            return Err(framing(format!(
                "declared length {} exceeds remaining {} bytes",
                length,
                rest.len()
            )));
        }

        let (payload, trailer) = rest.split_at(length);
        let trailer = trailer
            .strip_prefix(b",")
            .ok_or_else(|| framing("payload not followed by ','"))?;

        let trailer = ascii(trailer).ok_or_else(|| framing("non-ASCII signal fields"))?;
        let mut fields = trailer.split(',');
        let (Some(rssi), Some(snr), None) = (fields.next(), fields.next(), fields.next()) else {
            return Err(framing(format!(
                "expected rssi,snr after payload, got {:?}",
                trailer
            )));
        };
        let rssi: i16 = rssi
            .trim()
            .parse()
            .map_err(|_| framing(format!("invalid rssi {:?}", rssi)))?;
        let snr: i16 = snr
            .trim()
            .parse()
            .map_err(|_| framing(format!("invalid snr {:?}", snr)))?;

        log::trace!(
            "decoded {} from {}: {} bytes, rssi={}, snr={}",
            RECEIVE_MARKER,
            sender,
            payload.len(),
            rssi,
            snr
        );

        Ok(Some(InboundMessage {
            sender,
            payload: payload.to_vec(),
            rssi,
            snr,
        }))
    }

    /// Encode as the line the module would emit (without terminator).
    pub fn encode(&self) -> Vec<u8> {
        let mut line = format!("{}={},{},", RECEIVE_MARKER, self.sender, self.payload.len())
            .into_bytes();
        line.extend_from_slice(&self.payload);
        line.extend_from_slice(format!(",{},{}", self.rssi, self.snr).as_bytes());
        line
    }

    /// Address of the sending module.
    pub fn sender(&self) -> Address {
        self.sender
    }

    /// Raw payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload as text, with invalid UTF-8 replaced.
    pub fn payload_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    /// Received signal strength in dBm.
    pub fn rssi(&self) -> i16 {
        self.rssi
    }

    /// Signal-to-noise ratio in dB.
    pub fn snr(&self) -> i16 {
        self.snr
    }
}

fn framing(reason: impl Into<String>) -> ProtocolError {
    ProtocolError::framing(RECEIVE_MARKER, reason)
}

/// Split off the next comma-delimited field.
fn split_field(data: &[u8]) -> Option<(&[u8], &[u8])> {
    let comma = data.iter().position(|&b| b == b',')?;
    Some((&data[..comma], &data[comma + 1..]))
}

fn ascii(data: &[u8]) -> Option<&str> {
    if data.is_ascii() {
        std::str::from_utf8(data).ok()
    } else {
        None
    }
}

/// Unsigned decimal field: digits only, no sign or spaces.
fn digits(data: &[u8]) -> Option<&str> {
    if !data.is_empty() && data.iter().all(u8::is_ascii_digit) {
        ascii(data)
    } else {
        None
    }
}

fn lossy(data: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(data)
}

// ============================================================================
// Outbound
// ============================================================================

/// A message to transmit.
///
/// The payload is at most [`MAX_PAYLOAD_LEN`] bytes and never contains `\r`
/// or `\n`; both are checked at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    destination: Address,
    payload: Vec<u8>,
}

impl OutboundMessage {
    /// Create an outbound message, rejecting payloads the module cannot carry.
    pub fn new(destination: Address, payload: impl Into<Vec<u8>>) -> ProtocolResult<Self> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(ProtocolError::PayloadTooLong {
                max: MAX_PAYLOAD_LEN,
                actual: payload.len(),
            });
        }
        if let Some(pos) = payload.iter().position(|&b| b == b'\r' || b == b'\n') {
            return Err(ProtocolError::PayloadContainsNewline(pos));
        }
        Ok(OutboundMessage {
            destination,
            payload,
        })
    }

    /// Build a message from arbitrary bytes by removing every `\r` and `\n`
    /// and truncating to [`MAX_PAYLOAD_LEN`].
    pub fn sanitized(destination: Address, raw: &[u8]) -> Self {
        let mut payload: Vec<u8> = raw
            .iter()
            .copied()
            .filter(|&b| b != b'\r' && b != b'\n')
            .collect();
        payload.truncate(MAX_PAYLOAD_LEN);
        OutboundMessage {
            destination,
            payload,
        }
    }

    /// Destination address.
    pub fn destination(&self) -> Address {
        self.destination
    }

    /// Payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload as text, with invalid UTF-8 replaced.
    pub fn payload_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ping() {
        let msg = InboundMessage::decode("+RCV=12,4,ping,-80,10")
            .unwrap()
            .unwrap();
        assert_eq!(msg.sender(), Address::new(12));
        assert_eq!(msg.payload(), b"ping");
        assert_eq!(msg.rssi(), -80);
        assert_eq!(msg.snr(), 10);
    }

    #[test]
    fn test_decode_empty_payload() {
        let msg = InboundMessage::decode("+RCV=7,0,,-90,5").unwrap().unwrap();
        assert_eq!(msg.sender(), Address::new(7));
        assert!(msg.payload().is_empty());
        assert_eq!(msg.rssi(), -90);
        assert_eq!(msg.snr(), 5);
    }

    #[test]
    fn test_decode_payload_with_commas() {
        let msg = InboundMessage::decode("+RCV=3,10,a,b,,c,d,e,-42,-7")
            .unwrap()
            .unwrap();
        assert_eq!(msg.payload(), b"a,b,,c,d,e");
        assert_eq!(msg.rssi(), -42);
        assert_eq!(msg.snr(), -7);
    }

    #[test]
    fn test_decode_payload_ending_like_signal_fields() {
        let msg = InboundMessage::decode("+RCV=3,6,-1,2,3,-50,9")
            .unwrap()
            .unwrap();
        assert_eq!(msg.payload(), b"-1,2,3");
        assert_eq!((msg.rssi(), msg.snr()), (-50, 9));
    }

    #[test]
    fn test_non_marker_lines_are_ignored() {
        assert_eq!(InboundMessage::decode("+OK").unwrap(), None);
        assert_eq!(InboundMessage::decode("+ERR=4").unwrap(), None);
        assert_eq!(InboundMessage::decode("hello +RCV=1,1,a,1,1").unwrap(), None);
    }

    #[test]
    fn test_declared_length_exceeds_remaining() {
        let err = InboundMessage::decode("+RCV=12,40,ping,-80,10").unwrap_err();
        assert!(matches!(err, ProtocolError::Framing { .. }));
    }

    #[test]
    fn test_non_numeric_length() {
        let err = InboundMessage::decode("+RCV=12,four,ping,-80,10").unwrap_err();
        assert!(matches!(err, ProtocolError::Framing { .. }));
    }

    #[test]
    fn test_signed_or_padded_numbers_rejected() {
        for line in [
            "+RCV=12,+4,ping,-80,10",
            "+RCV=12, 4,ping,-80,10",
            "+RCV=+12,4,ping,-80,10",
            "+RCV=12,,ping,-80,10",
        ] {
            let err = InboundMessage::decode(line).unwrap_err();
            assert!(matches!(err, ProtocolError::Framing { .. }), "{}", line);
        }
    }

    #[test]
    fn test_missing_signal_fields() {
        assert!(InboundMessage::decode("+RCV=12,4,ping").is_err());
        assert!(InboundMessage::decode("+RCV=12,4,ping,-80").is_err());
        assert!(InboundMessage::decode("+RCV=12,4,ping,-80,10,3").is_err());
        assert!(InboundMessage::decode("+RCV=12,4,pingX-80,10").is_err());
    }

    #[test]
    fn test_bad_sender_and_marker_without_equals() {
        assert!(InboundMessage::decode("+RCV=abc,4,ping,-80,10").is_err());
        assert!(InboundMessage::decode("+RCV12,4,ping,-80,10").is_err());
    }

    #[test]
    fn test_encode_matches_module_format() {
        let msg = InboundMessage::new(Address::new(12), "a,b", -80, 10).unwrap();
        assert_eq!(msg.encode(), b"+RCV=12,3,a,b,-80,10");
        assert_eq!(InboundMessage::decode(msg.encode()).unwrap(), Some(msg));
    }

    #[test]
    fn test_decode_full_length_payload_of_commas() {
        let msg = InboundMessage::new(Address::new(65535), vec![b','; MAX_PAYLOAD_LEN], -120, -20)
            .unwrap();
        assert_eq!(InboundMessage::decode(msg.encode()).unwrap(), Some(msg));
    }

    #[test]
    fn test_outbound_rejects_long_payload() {
        let err = OutboundMessage::new(Address::new(1), vec![b'a'; 241]).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::PayloadTooLong {
                max: 240,
                actual: 241
            }
        );
        assert!(OutboundMessage::new(Address::new(1), vec![b'a'; 240]).is_ok());
    }

    #[test]
    fn test_outbound_rejects_newlines() {
        assert_eq!(
            OutboundMessage::new(Address::new(1), "ab\ncd").unwrap_err(),
            ProtocolError::PayloadContainsNewline(2)
        );
        assert!(OutboundMessage::new(Address::new(1), "\r").is_err());
    }

    #[test]
    fn test_sanitized_strips_newlines_then_truncates() {
        let mut raw = b"line1\r\nline2\n".to_vec();
        raw.extend(std::iter::repeat(b'x').take(300));
        let msg = OutboundMessage::sanitized(Address::new(5), &raw);
        assert_eq!(msg.payload().len(), MAX_PAYLOAD_LEN);
        assert!(msg.payload().starts_with(b"line1line2xxx"));
    }

    #[test]
    fn test_address_parse() {
        assert_eq!("86".parse::<Address>().unwrap(), Address::new(86));
        assert!("-1".parse::<Address>().is_err());
        assert!("70000".parse::<Address>().is_err());
    }
}
