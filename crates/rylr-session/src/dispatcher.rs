//! Replies to inbound messages.
//!
//! Decision order, on the payload:
//! 1. empty: reply with an empty payload
//! 2. exactly `ping`: reply `pong!`
//! 3. anything else: run it as a command line and reply with its output

use rylr_at::{InboundMessage, OutboundMessage};
use tracing::{info, warn};

use crate::error::SessionResult;
use crate::executor::Executor;
use crate::session::CommandSession;
use crate::telemetry::metric_defs;
use crate::transport::Transport;

/// Payload that asks for a pong.
pub const PING: &[u8] = b"ping";

/// Reply to [`PING`].
pub const PONG: &[u8] = b"pong!";

/// Which branch produced a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyKind {
    /// Empty payload echoed back.
    Echo,
    /// `ping` answered with `pong!`.
    Pong,
    /// Output of a local command.
    Executed {
        /// The command line that was run.
        command: String,
        /// Whether the command could be started at all.
        succeeded: bool,
    },
}

/// A reply decision: what to send and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// The branch taken.
    pub kind: ReplyKind,
    /// The message to transmit.
    pub message: OutboundMessage,
}

/// Answers inbound messages.
#[derive(Debug)]
pub struct Dispatcher<E: Executor> {
    executor: E,
}

impl<E: Executor> Dispatcher<E> {
    /// Create a dispatcher that runs commands with `executor`.
    pub fn new(executor: E) -> Self {
        Dispatcher { executor }
    }

    /// Access the executor.
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Decide the reply to `message` without sending it.
    ///
    /// Never fails: if the command cannot be run, the error text becomes the
    /// reply.
    pub fn reply_to(&mut self, message: &InboundMessage) -> Reply {
        let sender = message.sender();
        let payload = message.payload();

        if payload.is_empty() {
            return Reply {
                kind: ReplyKind::Echo,
                message: OutboundMessage::sanitized(sender, b""),
            };
        }

        if payload == PING {
            return Reply {
                kind: ReplyKind::Pong,
                message: OutboundMessage::sanitized(sender, PONG),
            };
        }

        let command = message.payload_str().into_owned();
        info!("Running command from {}: {:?}", sender, command);
        let (output, succeeded) = match self.executor.execute(&command) {
            Ok(output) => (output, true),
            Err(e) => {
                warn!("Command from {} failed: {}", sender, e);
                metric_defs::EXECUTOR_FAILURES.increment();
                (e.to_string().into_bytes(), false)
            }
        };

        Reply {
            kind: ReplyKind::Executed { command, succeeded },
            message: OutboundMessage::sanitized(sender, &output),
        }
    }

    /// Decide the reply to `message` and transmit it.
    pub fn dispatch<T: Transport>(
        &mut self,
        session: &mut CommandSession<T>,
        message: &InboundMessage,
    ) -> SessionResult<Reply> {
        let reply = self.reply_to(message);
        match session.transmit(&reply.message) {
            Ok(_) => {
                metric_defs::REPLIES_SENT.increment();
                Ok(reply)
            }
            Err(e) => {
                metric_defs::REPLIES_FAILED.increment();
                Err(e)
            }
        }
    }
}
