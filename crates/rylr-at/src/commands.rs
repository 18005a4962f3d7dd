//! Commands that can be sent to the module.
//!
//! The module understands:
//! - The bare `AT` connectivity check
//! - Setting commands `AT+<NAME>=<value>`
//! - Query commands `AT+<NAME>?`
//! - `AT+SEND` to transmit a message
//! - `AT+RESET` to restart the module

use crate::codec::LineCodec;
use crate::message::{Address, OutboundMessage};
use crate::radio::{PowerMode, RadioParameters};

/// Settings that can be read back with `AT+<NAME>?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    /// Modulation parameters (`PARAMETER`)
    Parameters,
    /// Center frequency (`BAND`)
    Band,
    /// Power mode (`MODE`)
    Mode,
    /// Network identifier (`NETWORKID`)
    NetworkId,
    /// Module address (`ADDRESS`)
    Address,
    /// RF output power (`CRFOP`)
    OutputPower,
    /// Firmware version (`VER`)
    Version,
    /// Unique module id (`UID`)
    Uid,
}

impl QueryKey {
    /// Get the command name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKey::Parameters => "PARAMETER",
            QueryKey::Band => "BAND",
            QueryKey::Mode => "MODE",
            QueryKey::NetworkId => "NETWORKID",
            QueryKey::Address => "ADDRESS",
            QueryKey::OutputPower => "CRFOP",
            QueryKey::Version => "VER",
            QueryKey::Uid => "UID",
        }
    }
}

impl std::str::FromStr for QueryKey {
    type Err = String;

    /// Parse a key from its wire name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PARAMETER" => Ok(QueryKey::Parameters),
            "BAND" => Ok(QueryKey::Band),
            "MODE" => Ok(QueryKey::Mode),
            "NETWORKID" => Ok(QueryKey::NetworkId),
            "ADDRESS" => Ok(QueryKey::Address),
            "CRFOP" => Ok(QueryKey::OutputPower),
            "VER" => Ok(QueryKey::Version),
            "UID" => Ok(QueryKey::Uid),
            other => Err(format!("unknown setting: {}", other)),
        }
    }
}

/// Commands that can be sent to the module.
#[derive(Debug, Clone, PartialEq)]
pub enum AtCommand {
    // ========== Control ==========
    /// Connectivity check; the module answers `+OK`.
    Test,

    /// Software reset; the module answers `+RESET` then `+READY`.
    Reset,

    // ========== Settings ==========
    /// Set modulation parameters.
    SetParameters(RadioParameters),

    /// Set the center frequency.
    SetBand {
        /// Frequency in Hz.
        hz: u32,
    },

    /// Set the power mode.
    SetMode(PowerMode),

    /// Set the network identifier.
    SetNetworkId(u8),

    /// Set this module's address.
    SetAddress(Address),

    /// Set RF output power in dBm.
    SetOutputPower(u8),

    /// Read back a setting.
    Query(QueryKey),

    // ========== Messaging ==========
    /// Transmit a message.
    Send(OutboundMessage),

    // ========== Raw ==========
    /// Raw command text, sent as-is.
    Raw(String),
}

impl AtCommand {
    /// Encode the command for transmission, including the `\r\n` terminator.
    pub fn encode(&self) -> Vec<u8> {
        LineCodec::encode_command(&self.to_bytes())
    }

    /// The command line without terminator.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            AtCommand::Send(message) => {
                let mut line = format!(
                    "AT+SEND={},{},",
                    message.destination(),
                    message.payload().len()
                )
                .into_bytes();
                line.extend_from_slice(message.payload());
                line
            }
            other => other.to_command_string().into_bytes(),
        }
    }

    /// Convert the command to a printable string.
    pub fn to_command_string(&self) -> String {
        match self {
            AtCommand::Test => "AT".to_string(),
            AtCommand::Reset => "AT+RESET".to_string(),
            AtCommand::SetParameters(p) => format!(
                "AT+PARAMETER={},{},{},{}",
                p.spreading_factor, p.bandwidth, p.coding_rate, p.preamble
            ),
            AtCommand::SetBand { hz } => format!("AT+BAND={}", hz),
            AtCommand::SetMode(mode) => format!("AT+MODE={}", mode.code()),
            AtCommand::SetNetworkId(id) => format!("AT+NETWORKID={}", id),
            AtCommand::SetAddress(address) => format!("AT+ADDRESS={}", address),
            AtCommand::SetOutputPower(dbm) => format!("AT+CRFOP={:02}", dbm),
            AtCommand::Query(key) => format!("AT+{}?", key.as_str()),
            AtCommand::Send(message) => format!(
                "AT+SEND={},{},{}",
                message.destination(),
                message.payload().len(),
                message.payload_str()
            ),
            AtCommand::Raw(command) => command.clone(),
        }
    }

    /// Whether the module goes on air for this command.
    ///
    /// Transmissions take much longer to acknowledge than local settings.
    pub fn is_transmit(&self) -> bool {
        matches!(self, AtCommand::Send(_))
    }
}

impl std::fmt::Display for AtCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_command_string())
    }
}
