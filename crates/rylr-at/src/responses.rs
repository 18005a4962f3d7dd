//! Response parsing for the AT protocol.
//!
//! Lines from the module can be:
//! - Acknowledgement: `+OK`
//! - Failure: `+ERR=<code>`
//! - Query result: `+<NAME>=<value>`
//! - Unsolicited events: `+RCV=...`, `+READY`, `+RESET`

use crate::error::ModuleErrorCode;
use crate::message::RECEIVE_MARKER;

/// Literal success token.
pub const SUCCESS_TOKEN: &str = "+OK";

/// Marker preceding a module error code.
pub const ERROR_MARKER: &str = "+ERR";

/// Parsed line from the module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// The command succeeded.
    Ok,

    /// The module rejected the command.
    Error(ModuleErrorCode),

    /// An inbound message announcement; decode it with
    /// [`InboundMessage::decode`](crate::InboundMessage::decode).
    Received,

    /// The module finished booting.
    Ready,

    /// The module acknowledged a reset.
    Reset,

    /// A query result, `+<key>=<value>`.
    Value {
        /// Setting name, e.g. `ADDRESS`.
        key: String,
        /// Reported value.
        value: String,
    },

    /// Unknown/unrecognized line.
    Unknown(String),
}

impl Response {
    /// Parse a received line.
    pub fn parse(line: impl AsRef<[u8]>) -> Response {
        let text = String::from_utf8_lossy(line.as_ref());
        let text = text.trim();

        if text == SUCCESS_TOKEN {
            return Response::Ok;
        }

        // A received payload may itself contain the error marker.
        if text.starts_with(RECEIVE_MARKER) {
            return Response::Received;
        }

        if let Some(code) = Self::error_code(text) {
            return Response::Error(code);
        }

        match text {
            "+READY" => return Response::Ready,
            "+RESET" => return Response::Reset,
            _ => {}
        }

        if let Some((key, value)) = text.strip_prefix('+').and_then(|t| t.split_once('=')) {
            if !key.is_empty() && key.bytes().all(|b| b.is_ascii_uppercase()) {
                return Response::Value {
                    key: key.to_string(),
                    value: value.to_string(),
                };
            }
        }

        log::debug!("unrecognized line: {:?}", text);
        Response::Unknown(text.to_string())
    }

    /// Find an error report anywhere in the line.
    ///
    /// Returns the looked-up code for `+ERR=<code>`; a code outside the
    /// documented set is still reported, as [`ModuleErrorCode::Unknown`].
    pub fn error_code(text: &str) -> Option<ModuleErrorCode> {
        let start = text.find(ERROR_MARKER)? + ERROR_MARKER.len();
        let code = text[start..].strip_prefix('=')?;
        let digits = code
            .find(|c: char| !c.is_ascii_digit())
            .map_or(code, |end| &code[..end]);
        if digits.is_empty() {
            Some(ModuleErrorCode::from_code(code.trim()))
        } else {
            Some(ModuleErrorCode::from_code(digits))
        }
    }

    /// Check if this is the success token.
    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok)
    }

    /// Check if this is an error report.
    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error(_))
    }

    /// Get the error code if this is an error report.
    pub fn as_error(&self) -> Option<&ModuleErrorCode> {
        match self {
            Response::Error(code) => Some(code),
            _ => None,
        }
    }

    /// Get the value if this is a query result.
    pub fn as_value(&self) -> Option<&str> {
        match self {
            Response::Value { value, .. } => Some(value),
            _ => None,
        }
    }
}
