//! Command/response exchange with the module.

use std::collections::VecDeque;
use std::io;
use std::time::{Duration, Instant};

use rylr_at::{AtCommand, OutboundMessage, Response};
use tracing::{debug, info, warn};

use crate::error::{SessionError, SessionResult};
use crate::line_reader::{LineReader, RawLine};
use crate::telemetry::metric_defs;
use crate::transport::Transport;

/// Default time to wait for a reply to a local setting.
pub const CONFIG_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time to wait for a transmission to be acknowledged.
pub const TRANSMIT_TIMEOUT: Duration = Duration::from_secs(20);

/// Reply timeouts used by [`CommandSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimeouts {
    /// Timeout for configuration commands.
    pub config: Duration,
    /// Timeout for `AT+SEND`.
    pub transmit: Duration,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        SessionTimeouts {
            config: CONFIG_TIMEOUT,
            transmit: TRANSMIT_TIMEOUT,
        }
    }
}

impl SessionTimeouts {
    /// Timeout appropriate for `command`.
    pub fn for_command(&self, command: &AtCommand) -> Duration {
        if command.is_transmit() {
            self.transmit
        } else {
            self.config
        }
    }
}

/// Result of one send/await cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// At least one reply line arrived.
    Ok(Vec<RawLine>),
    /// Nothing arrived before the timeout.
    TimedOut,
}

/// Owns the link to the module and runs command exchanges over it.
///
/// Inbound message announcements that arrive while a command is waiting for
/// its reply are not part of that reply; they are queued and handed out by
/// [`CommandSession::receive`].
///
/// The transport is closed when the session is closed or dropped, whichever
/// comes first.
pub struct CommandSession<T: Transport> {
    transport: T,
    reader: LineReader,
    timeouts: SessionTimeouts,
    unsolicited: VecDeque<RawLine>,
    closed: bool,
}

impl<T: Transport> CommandSession<T> {
    /// Create a session over `transport`.
    pub fn new(transport: T, timeouts: SessionTimeouts) -> Self {
        CommandSession {
            transport,
            reader: LineReader::new(),
            timeouts,
            unsolicited: VecDeque::new(),
            closed: false,
        }
    }

    /// The configured timeouts.
    pub fn timeouts(&self) -> SessionTimeouts {
        self.timeouts
    }

    /// Access the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Write `command` and wait up to `timeout` for its reply.
    ///
    /// Returns every reply line that arrived in the first batch containing
    /// one. Module errors are not interpreted here; see
    /// [`CommandSession::config`].
    pub fn send(&mut self, command: &AtCommand, timeout: Duration) -> SessionResult<CommandOutcome> {
        info!("--> {}", command);
        self.transport.write(&command.encode())?;
        self.transport.flush()?;
        metric_defs::COMMANDS_SENT.increment();

        let deadline = Instant::now() + timeout;
        let mut replies = Vec::new();
        while replies.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let lines = self.reader.read_lines(&mut self.transport, remaining)?;
            if lines.is_empty() {
                break;
            }
            for line in lines {
                info!("<-- {}", line);
                metric_defs::LINES_RECEIVED.increment();
                if line.is_inbound() {
                    self.unsolicited.push_back(line);
                } else {
                    replies.push(line);
                }
            }
        }

        if replies.is_empty() {
            debug!("No reply to {} within {:?}", command, timeout);
            Ok(CommandOutcome::TimedOut)
        } else {
            Ok(CommandOutcome::Ok(replies))
        }
    }

    /// Send a command whose reply must be clean.
    ///
    /// Fails with [`SessionError::NoReply`] on timeout and with
    /// [`SessionError::ModuleError`] if any reply line carries `+ERR=`.
    /// Otherwise returns the reply lines unchanged.
    pub fn config(&mut self, command: &AtCommand) -> SessionResult<Vec<RawLine>> {
        let timeout = self.timeouts.for_command(command);
        self.checked(command, timeout)
    }

    /// Transmit a message and wait for the module to acknowledge it.
    pub fn transmit(&mut self, message: &OutboundMessage) -> SessionResult<Vec<RawLine>> {
        let command = AtCommand::Send(message.clone());
        let lines = self.checked(&command, self.timeouts.transmit)?;
        if !lines.iter().any(|line| line.response().is_ok()) {
            warn!(
                "Transmit to {} acknowledged without {}: {:?}",
                message.destination(),
                rylr_at::SUCCESS_TOKEN,
                lines.iter().map(|l| l.to_string()).collect::<Vec<_>>()
            );
        }
        Ok(lines)
    }

    fn checked(&mut self, command: &AtCommand, timeout: Duration) -> SessionResult<Vec<RawLine>> {
        let lines = match self.send(command, timeout)? {
            CommandOutcome::Ok(lines) => lines,
            CommandOutcome::TimedOut => {
                metric_defs::COMMANDS_FAILED.increment();
                return Err(SessionError::NoReply {
                    command: command.to_command_string(),
                    timeout,
                });
            }
        };

        for line in &lines {
            if let Some(code) = Response::error_code(&line.as_str()) {
                metric_defs::COMMANDS_FAILED.increment();
                return Err(SessionError::ModuleError {
                    command: command.to_command_string(),
                    code,
                });
            }
        }

        Ok(lines)
    }

    /// Next lines from the module that are not command replies.
    ///
    /// Hands out queued inbound announcements first; otherwise waits up to
    /// `timeout` for new lines. An empty result means nothing arrived.
    pub fn receive(&mut self, timeout: Duration) -> SessionResult<Vec<RawLine>> {
        if !self.unsolicited.is_empty() {
            return Ok(self.unsolicited.drain(..).collect());
        }
        let lines = self.reader.read_lines(&mut self.transport, timeout)?;
        for line in &lines {
            info!("<-- {}", line);
            metric_defs::LINES_RECEIVED.increment();
        }
        Ok(lines)
    }

    /// Put lines back in front of the receive queue, keeping their order.
    pub(crate) fn requeue(&mut self, lines: impl DoubleEndedIterator<Item = RawLine>) {
        for line in lines.rev() {
            self.unsolicited.push_front(line);
        }
    }

    /// Throw away anything the module sent before we started talking to it.
    pub fn discard_pending(&mut self) -> SessionResult<()> {
        let stale = self.reader.discard(&mut self.transport)?;
        self.unsolicited.clear();
        if stale > 0 {
            debug!("Discarded {} stale bytes", stale);
        }
        Ok(())
    }

    /// Close the transport. Idempotent.
    pub fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.transport.close()
    }
}

impl<T: Transport> Drop for CommandSession<T> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close transport: {}", e);
        }
    }
}
