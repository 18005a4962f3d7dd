//! Startup configuration sequence.

use rylr_at::{AtCommand, RadioSettings};
use tracing::{debug, info, warn};

use crate::error::{SessionError, SessionResult};
use crate::session::CommandSession;
use crate::transport::Transport;

/// An ordered list of configuration commands, each of which must be answered
/// with exactly `+OK`.
///
/// Commands are applied strictly in order. The first failure aborts the
/// sequence; settings already applied are left as they are.
#[derive(Debug, Clone, PartialEq)]
pub struct SetupSequence {
    commands: Vec<AtCommand>,
}

impl SetupSequence {
    /// Create a sequence from explicit commands.
    pub fn new(commands: Vec<AtCommand>) -> Self {
        SetupSequence { commands }
    }

    /// The standard sequence for `settings`.
    pub fn from_settings(settings: &RadioSettings) -> SessionResult<Self> {
        Ok(SetupSequence::new(settings.setup_commands()?))
    }

    /// The commands, in application order.
    pub fn commands(&self) -> &[AtCommand] {
        &self.commands
    }

    /// Apply every command through `session`.
    pub fn apply<T: Transport>(&self, session: &mut CommandSession<T>) -> SessionResult<()> {
        for (index, command) in self.commands.iter().enumerate() {
            let lines = session.config(command)?;
            let Some(first) = lines.first() else {
                return Err(SessionError::NoReply {
                    command: command.to_command_string(),
                    timeout: session.timeouts().for_command(command),
                });
            };

            if lines.len() > 1 {
                warn!(
                    "{} answered with {} lines, using the first: {:?}",
                    command,
                    lines.len(),
                    lines.iter().map(|l| l.to_string()).collect::<Vec<_>>()
                );
            }

            if !first.response().is_ok() {
                return Err(SessionError::UnexpectedResponse {
                    command: command.to_command_string(),
                    response: first.to_string(),
                });
            }

            debug!("Setup step {}/{} done: {}", index + 1, self.commands.len(), command);
        }

        info!("Setup complete ({} commands)", self.commands.len());
        Ok(())
    }
}
