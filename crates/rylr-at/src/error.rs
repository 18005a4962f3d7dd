//! Protocol error types.

use thiserror::Error;

/// Errors that can occur when working with the AT protocol.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// An inbound message announcement could not be decoded.
    #[error("malformed {marker} frame: {reason}")]
    Framing {
        /// The marker token of the offending line.
        marker: &'static str,
        /// What was wrong with the frame.
        reason: String,
    },

    /// A payload exceeds the module's transmit limit.
    #[error("payload too long: maximum {max} bytes, got {actual}")]
    PayloadTooLong {
        /// Maximum allowed length.
        max: usize,
        /// Actual length.
        actual: usize,
    },

    /// A payload contains a line terminator, which would end the command early.
    #[error("payload contains a line terminator at byte {0}")]
    PayloadContainsNewline(usize),

    /// A radio parameter is outside the range the module accepts.
    #[error("invalid {name}: {value} (allowed {allowed})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Rejected value.
        value: i64,
        /// Human-readable allowed range.
        allowed: &'static str,
    },
}

impl ProtocolError {
    pub(crate) fn framing(marker: &'static str, reason: impl Into<String>) -> Self {
        ProtocolError::Framing {
            marker,
            reason: reason.into(),
        }
    }
}

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Error codes reported by the module as `+ERR=<code>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModuleErrorCode {
    /// 1: command not terminated with `\r\n`.
    MissingTerminator,
    /// 2: command does not start with `AT`.
    MissingAtPrefix,
    /// 3: no `=` in a command that takes arguments.
    MissingEquals,
    /// 4: unknown command.
    UnknownCommand,
    /// 10: transmit timed out.
    TxTimeout,
    /// 11: receive timed out.
    RxTimeout,
    /// 12: CRC error.
    CrcError,
    /// 13: transmit data longer than 240 bytes.
    TxDataTooLong,
    /// 15: the module's own catch-all.
    UnknownFailure,
    /// A code outside the documented set, kept verbatim.
    Unknown(String),
}

impl ModuleErrorCode {
    /// Look up the code reported after `+ERR=`.
    pub fn from_code(code: &str) -> Self {
        match code.trim().parse::<u16>() {
            Ok(1) => ModuleErrorCode::MissingTerminator,
            Ok(2) => ModuleErrorCode::MissingAtPrefix,
            Ok(3) => ModuleErrorCode::MissingEquals,
            Ok(4) => ModuleErrorCode::UnknownCommand,
            Ok(10) => ModuleErrorCode::TxTimeout,
            Ok(11) => ModuleErrorCode::RxTimeout,
            Ok(12) => ModuleErrorCode::CrcError,
            Ok(13) => ModuleErrorCode::TxDataTooLong,
            Ok(15) => ModuleErrorCode::UnknownFailure,
            _ => ModuleErrorCode::Unknown(code.trim().to_string()),
        }
    }

    /// The numeric code as reported, if it is a documented one.
    pub fn code(&self) -> Option<u16> {
        match self {
            ModuleErrorCode::MissingTerminator => Some(1),
            ModuleErrorCode::MissingAtPrefix => Some(2),
            ModuleErrorCode::MissingEquals => Some(3),
            ModuleErrorCode::UnknownCommand => Some(4),
            ModuleErrorCode::TxTimeout => Some(10),
            ModuleErrorCode::RxTimeout => Some(11),
            ModuleErrorCode::CrcError => Some(12),
            ModuleErrorCode::TxDataTooLong => Some(13),
            ModuleErrorCode::UnknownFailure => Some(15),
            ModuleErrorCode::Unknown(_) => None,
        }
    }

    /// Documented cause for this code.
    pub fn cause(&self) -> &'static str {
        match self {
            ModuleErrorCode::MissingTerminator => "command is not terminated with CR LF",
            ModuleErrorCode::MissingAtPrefix => "command does not start with AT",
            ModuleErrorCode::MissingEquals => "command is missing the '=' symbol",
            ModuleErrorCode::UnknownCommand => "unknown command",
            ModuleErrorCode::TxTimeout => "transmit timed out",
            ModuleErrorCode::RxTimeout => "receive timed out",
            ModuleErrorCode::CrcError => "CRC error",
            ModuleErrorCode::TxDataTooLong => "transmit data exceeds 240 bytes",
            ModuleErrorCode::UnknownFailure => "unknown failure",
            ModuleErrorCode::Unknown(_) => "unknown error code",
        }
    }

    /// Whether the code is outside the documented set.
    pub fn is_unknown(&self) -> bool {
        matches!(self, ModuleErrorCode::Unknown(_))
    }
}

impl std::fmt::Display for ModuleErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModuleErrorCode::Unknown(code) => write!(f, "{} ({})", self.cause(), code),
            known => write!(
                f,
                "{} ({})",
                known.cause(),
                known.code().unwrap_or_default()
            ),
        }
    }
}
