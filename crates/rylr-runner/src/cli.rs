//! Command line.

use std::path::PathBuf;

use clap::Parser;
use rylr_at::Address;
use rylr_session::RunMode;

use crate::config::{ConfigError, StationConfig};

/// Drive a REYAX RYLR LoRa module: configure it, then answer or send messages.
#[derive(Debug, Clone, Parser)]
#[command(name = "rylr", version, about)]
pub struct Args {
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Serial device of the module
    #[arg(short, long)]
    pub device: Option<PathBuf>,

    /// Reach the module through a serial-over-TCP bridge at host:port
    #[arg(long, conflicts_with = "device")]
    pub tcp: Option<String>,

    /// Address of this module
    #[arg(short, long)]
    pub address: Option<Address>,

    /// receiver: answer inbound messages; sender: send lines read from stdin
    #[arg(short, long)]
    pub mode: Option<RunMode>,

    /// Refuse remote commands instead of running them
    #[arg(long)]
    pub no_exec: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    pub print_config: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Load the configuration file, if any, and apply the overrides.
    pub fn load_config(&self) -> Result<StationConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => StationConfig::load(path)?,
            None => StationConfig::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Apply command line overrides to `config`.
    pub fn apply(&self, config: &mut StationConfig) {
        if let Some(device) = &self.device {
            config.device = device.clone();
            config.tcp = None;
        }
        if let Some(tcp) = &self.tcp {
            config.tcp = Some(tcp.clone());
        }
        if let Some(address) = self.address {
            config.radio.address = address;
        }
        if let Some(mode) = self.mode {
            config.run_mode = mode.to_string();
        }
        if self.no_exec {
            config.exec.enabled = false;
        }
    }
}
