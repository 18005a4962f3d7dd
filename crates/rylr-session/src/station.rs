//! The long-running station loop.
//!
//! A station owns a configured [`CommandSession`] and alternates between
//! waiting for lines and answering the messages among them. Nothing runs
//! concurrently: a reply is fully acknowledged (or timed out) before the next
//! line is looked at.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rylr_at::{Address, InboundMessage, OutboundMessage};
use tracing::{debug, info, warn};

use crate::dispatcher::Dispatcher;
use crate::error::{SessionError, SessionResult};
use crate::executor::Executor;
use crate::line_reader::RawLine;
use crate::session::CommandSession;
use crate::setup::SetupSequence;
use crate::telemetry::metric_defs;
use crate::transport::Transport;

/// Default wait per receive poll when idle.
pub const IDLE_POLL: Duration = Duration::from_secs(1);

/// How the station treats inbound messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Answer every inbound message through the dispatcher.
    #[default]
    Receiver,
    /// Send messages on request and report replies; never answers by itself.
    Sender,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::Receiver => f.write_str("receiver"),
            RunMode::Sender => f.write_str("sender"),
        }
    }
}

impl std::str::FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "receiver" | "rx" => Ok(RunMode::Receiver),
            "sender" | "tx" => Ok(RunMode::Sender),
            other => Err(format!("unknown run mode: {}", other)),
        }
    }
}

/// Counts kept by a station.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StationStats {
    /// Lines received outside command replies.
    pub lines_received: u64,
    /// Inbound messages decoded.
    pub messages_received: u64,
    /// Announcements discarded as malformed.
    pub framing_errors: u64,
    /// Replies acknowledged by the module.
    pub replies_sent: u64,
    /// Replies that timed out or were rejected.
    pub reply_failures: u64,
}

/// A configured module plus the logic answering its traffic.
pub struct Station<T: Transport, E: Executor> {
    session: CommandSession<T>,
    dispatcher: Dispatcher<E>,
    mode: RunMode,
    idle_poll: Duration,
    stats: StationStats,
}

impl<T: Transport, E: Executor> Station<T, E> {
    /// Create a station.
    pub fn new(session: CommandSession<T>, dispatcher: Dispatcher<E>, mode: RunMode) -> Self {
        Station {
            session,
            dispatcher,
            mode,
            idle_poll: IDLE_POLL,
            stats: StationStats::default(),
        }
    }

    /// Set how long each idle receive poll waits.
    pub fn with_idle_poll(mut self, idle_poll: Duration) -> Self {
        self.idle_poll = idle_poll;
        self
    }

    /// The run mode.
    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Counters so far.
    pub fn stats(&self) -> StationStats {
        self.stats
    }

    /// Access the session.
    pub fn session(&self) -> &CommandSession<T> {
        &self.session
    }

    /// Mutable access to the session.
    pub fn session_mut(&mut self) -> &mut CommandSession<T> {
        &mut self.session
    }

    /// Drop stale input and apply `setup`.
    pub fn configure(&mut self, setup: &SetupSequence) -> SessionResult<()> {
        self.session.discard_pending()?;
        setup.apply(&mut self.session)
    }

    /// Run until `shutdown` is set.
    ///
    /// Returns only on shutdown or when the link fails; everything else is
    /// logged and the loop carries on.
    pub fn run(&mut self, shutdown: &AtomicBool) -> SessionResult<()> {
        info!("Station running in {} mode", self.mode);
        while !shutdown.load(Ordering::Relaxed) {
            self.poll_once()?;
        }
        info!("Station stopping: {:?}", self.stats);
        Ok(())
    }

    /// Wait once for lines and handle them. Returns the number of messages
    /// decoded.
    pub fn poll_once(&mut self) -> SessionResult<usize> {
        let lines = self.session.receive(self.idle_poll)?;
        let mut messages = 0;
        for line in &lines {
            if let Some(message) = self.decode_line(line) {
                messages += 1;
                self.handle_message(&message)?;
            }
        }
        Ok(messages)
    }

    /// Decode one line. Malformed announcements are counted and dropped.
    fn decode_line(&mut self, line: &RawLine) -> Option<InboundMessage> {
        self.stats.lines_received += 1;
        match InboundMessage::decode(line.as_bytes()) {
            Ok(Some(message)) => {
                self.stats.messages_received += 1;
                metric_defs::MESSAGES_RECEIVED.increment();
                info!(
                    "Message from {} (rssi {}, snr {}): {:?}",
                    message.sender(),
                    message.rssi(),
                    message.snr(),
                    message.payload_str()
                );
                Some(message)
            }
            Ok(None) => {
                debug!("Ignoring {}", line);
                None
            }
            Err(source) => {
                let error = SessionError::Framing {
                    line: line.to_string(),
                    source,
                };
                warn!("Discarding line: {}", error);
                self.stats.framing_errors += 1;
                metric_defs::FRAMING_ERRORS.increment();
                None
            }
        }
    }

    fn handle_message(&mut self, message: &InboundMessage) -> SessionResult<()> {
        if self.mode == RunMode::Sender {
            return Ok(());
        }
        match self.dispatcher.dispatch(&mut self.session, message) {
            Ok(reply) => {
                self.stats.replies_sent += 1;
                debug!("Replied to {} ({:?})", message.sender(), reply.kind);
                Ok(())
            }
            Err(e) if e.is_recoverable() => {
                self.stats.reply_failures += 1;
                warn!("Reply to {} failed: {}", message.sender(), e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Transmit `message` and wait for the peer to answer.
    ///
    /// Waits up to the transmit timeout for a message from the destination.
    /// Messages from other senders are logged and skipped. Returns `None` if
    /// the peer stays silent.
    pub fn send_and_await(
        &mut self,
        message: &OutboundMessage,
    ) -> SessionResult<Option<InboundMessage>> {
        self.session.transmit(message)?;

        let timeout = self.session.timeouts().transmit;
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                info!("No reply from {} within {:?}", message.destination(), timeout);
                return Ok(None);
            }
            let mut lines = self.session.receive(remaining)?.into_iter();
            while let Some(line) = lines.next() {
                let Some(reply) = self.decode_line(&line) else {
                    continue;
                };
                let destination = message.destination();
                if destination == Address::BROADCAST || reply.sender() == destination {
                    self.session.requeue(lines);
                    return Ok(Some(reply));
                }
                debug!("Skipping message from {}", reply.sender());
            }
        }
    }

    /// Close the link.
    pub fn close(&mut self) -> io::Result<()> {
        self.session.close()
    }
}
