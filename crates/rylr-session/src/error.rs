//! Session error types.

use std::io;
use std::time::Duration;

use rylr_at::{ModuleErrorCode, ProtocolError};
use thiserror::Error;

/// Errors that can occur while talking to the module.
///
/// During startup configuration every variant is fatal. In the receive loop
/// only [`SessionError::Transport`] is; the rest are reported and the loop
/// moves on to the next message.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No line arrived before the timeout.
    #[error("no reply to {command} within {timeout:?}")]
    NoReply {
        /// The command that went unanswered.
        command: String,
        /// How long we waited.
        timeout: Duration,
    },

    /// The module reported `+ERR=<code>`.
    #[error("module error for {command}: {code}")]
    ModuleError {
        /// The rejected command.
        command: String,
        /// The reported code.
        code: ModuleErrorCode,
    },

    /// The module replied, but not with `+OK`.
    #[error("unexpected response to {command}: {response}")]
    UnexpectedResponse {
        /// The command sent.
        command: String,
        /// The line received instead of `+OK`.
        response: String,
    },

    /// An inbound message announcement could not be decoded.
    #[error("framing error in {line:?}: {source}")]
    Framing {
        /// The offending line.
        line: String,
        /// What was wrong with it.
        #[source]
        source: ProtocolError,
    },

    /// A value violated a protocol constraint before anything was sent.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The underlying link failed.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
}

impl SessionError {
    /// Whether the session can keep running after this error.
    ///
    /// Only a broken link is unrecoverable once the module is configured.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SessionError::Transport(_))
    }

    /// The module error code, if the module reported one.
    pub fn module_code(&self) -> Option<&ModuleErrorCode> {
        match self {
            SessionError::ModuleError { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// Result type alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
