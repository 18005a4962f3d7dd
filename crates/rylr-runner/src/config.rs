//! Station configuration file.
//!
//! Every field has a default, so an empty file (or no file at all) describes
//! the standard station: `/dev/ttyACM0` at 9600 baud, 868.5 MHz, network 3,
//! address 86, answering messages.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rylr_at::{ProtocolError, RadioSettings};
use rylr_session::{RunMode, SessionTimeouts, SetupSequence};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default serial device.
pub const DEFAULT_DEVICE: &str = "/dev/ttyACM0";

/// Default serial speed.
pub const DEFAULT_BAUD: u32 = 9600;

/// Errors from loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The YAML did not describe a valid configuration.
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A radio setting is out of range.
    #[error("invalid radio settings: {0}")]
    Radio(#[from] ProtocolError),

    /// The run mode is not recognised.
    #[error("{0}")]
    RunMode(String),

    /// A timeout of zero.
    #[error("timeout {name} must be greater than zero")]
    ZeroTimeout {
        /// Field name.
        name: &'static str,
    },
}

/// Reply and polling timeouts, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutConfig {
    /// Wait for a reply to a configuration command.
    pub config_ms: u64,
    /// Wait for a transmission to be acknowledged, and for a peer's answer.
    pub transmit_ms: u64,
    /// Wait per receive poll when idle.
    pub idle_poll_ms: u64,
    /// Limit on a remotely requested command.
    pub exec_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        TimeoutConfig {
            config_ms: 5_000,
            transmit_ms: 20_000,
            idle_poll_ms: 1_000,
            exec_ms: 10_000,
        }
    }
}

impl TimeoutConfig {
    /// Timeouts for the command session.
    pub fn session(&self) -> SessionTimeouts {
        SessionTimeouts {
            config: Duration::from_millis(self.config_ms),
            transmit: Duration::from_millis(self.transmit_ms),
        }
    }

    /// Idle receive poll.
    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    /// Executor time limit.
    pub fn exec(&self) -> Duration {
        Duration::from_millis(self.exec_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("config_ms", self.config_ms),
            ("transmit_ms", self.transmit_ms),
            ("idle_poll_ms", self.idle_poll_ms),
            ("exec_ms", self.exec_ms),
        ];
        match fields.iter().find(|(_, value)| *value == 0) {
            Some((name, _)) => Err(ConfigError::ZeroTimeout { name: *name }),
            None => Ok(()),
        }
    }
}

/// Remote command execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecConfig {
    /// Run commands received over the air. When off, the reply says so.
    pub enabled: bool,
}

impl Default for ExecConfig {
    fn default() -> Self {
        ExecConfig { enabled: true }
    }
}

/// Complete station configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StationConfig {
    /// Serial device node.
    pub device: PathBuf,
    /// `host:port` of a serial-over-TCP bridge, used instead of `device`.
    pub tcp: Option<String>,
    /// Serial speed, applied with `stty` when `configure_tty` is set.
    pub baud: u32,
    /// Set line speed and raw mode on the device before opening it.
    pub configure_tty: bool,
    /// `receiver` or `sender`.
    pub run_mode: String,
    /// Module settings applied at startup.
    pub radio: RadioSettings,
    /// Timeouts.
    pub timeouts: TimeoutConfig,
    /// Remote command execution.
    pub exec: ExecConfig,
}

impl Default for StationConfig {
    fn default() -> Self {
        StationConfig {
            device: PathBuf::from(DEFAULT_DEVICE),
            tcp: None,
            baud: DEFAULT_BAUD,
            configure_tty: true,
            run_mode: RunMode::default().to_string(),
            radio: RadioSettings::default(),
            timeouts: TimeoutConfig::default(),
            exec: ExecConfig::default(),
        }
    }
}

impl StationConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        // serde_yaml rejects an empty document for a struct
        let config: StationConfig = if yaml.trim().is_empty() {
            StationConfig::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Render as YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Check every setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.radio.validate()?;
        self.timeouts.validate()?;
        self.mode()?;
        Ok(())
    }

    /// The parsed run mode.
    pub fn mode(&self) -> Result<RunMode, ConfigError> {
        self.run_mode.parse().map_err(ConfigError::RunMode)
    }

    /// The startup command sequence.
    pub fn setup_sequence(&self) -> Result<SetupSequence, ConfigError> {
        Ok(SetupSequence::new(self.radio.setup_commands()?))
    }

    /// Where the module is reached, for log messages.
    pub fn link_name(&self) -> String {
        match &self.tcp {
            Some(addr) => format!("tcp://{}", addr),
            None => self.device.display().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rylr_at::{Address, AtCommand};

    #[test]
    fn test_empty_document_is_default() {
        let config = StationConfig::from_yaml_str("").unwrap();
        assert_eq!(config, StationConfig::default());
        assert_eq!(config.mode().unwrap(), RunMode::Receiver);
        assert!(config.exec.enabled);
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let yaml = "radio:\n  address: 12\ntimeouts:\n  transmit_ms: 3000\n";
        let config = StationConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.radio.address, Address::new(12));
        assert_eq!(config.radio.network_id, 3);
        assert_eq!(config.timeouts.transmit_ms, 3000);
        assert_eq!(config.timeouts.config_ms, 5000);
        assert_eq!(config.device, PathBuf::from(DEFAULT_DEVICE));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = StationConfig::from_yaml_str("devcie: /dev/ttyUSB0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_out_of_range_radio_rejected() {
        let err = StationConfig::from_yaml_str("radio:\n  network_id: 17\n").unwrap_err();
        assert!(matches!(err, ConfigError::Radio(_)));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = StationConfig::from_yaml_str("timeouts:\n  idle_poll_ms: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ZeroTimeout { name: "idle_poll_ms" }));
    }

    #[test]
    fn test_bad_run_mode_rejected() {
        let err = StationConfig::from_yaml_str("run_mode: relay\n").unwrap_err();
        assert!(matches!(err, ConfigError::RunMode(_)));
    }

    #[test]
    fn test_setup_sequence_follows_radio() {
        let config = StationConfig::from_yaml_str("radio:\n  address: 7\n").unwrap();
        let setup = config.setup_sequence().unwrap();
        assert!(setup
            .commands()
            .contains(&AtCommand::SetAddress(Address::new(7))));
    }

    #[test]
    fn test_yaml_round_trip() {
        let mut config = StationConfig::default();
        config.tcp = Some("127.0.0.1:4000".to_string());
        let yaml = config.to_yaml().unwrap();
        assert_eq!(StationConfig::from_yaml_str(&yaml).unwrap(), config);
        assert_eq!(config.link_name(), "tcp://127.0.0.1:4000");
    }
}
