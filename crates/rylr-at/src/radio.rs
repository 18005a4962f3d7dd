//! Radio settings and the ordered configuration sequence.
//!
//! The module stores its settings via individual AT commands. They must be
//! applied in dependency order: connectivity check, modulation parameters,
//! band, power mode, network id, address, output power.

use serde::{Deserialize, Serialize};

use crate::commands::AtCommand;
use crate::error::{ProtocolError, ProtocolResult};
use crate::message::Address;

/// Modulation parameters for `AT+PARAMETER=<sf>,<bw>,<cr>,<preamble>`.
///
/// `bandwidth` and `coding_rate` are the module's codes, not physical values:
/// bandwidth 7 is 125 kHz, 8 is 250 kHz, 9 is 500 kHz; coding rate 1 is 4/5
/// through 4 for 4/8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RadioParameters {
    /// Spreading factor (7-12).
    pub spreading_factor: u8,
    /// Bandwidth code (0-9).
    pub bandwidth: u8,
    /// Coding rate code (1-4).
    pub coding_rate: u8,
    /// Programmed preamble (4-7, or 12 on network 18).
    pub preamble: u8,
}

impl Default for RadioParameters {
    fn default() -> Self {
        RadioParameters {
            spreading_factor: 12,
            bandwidth: 7,
            coding_rate: 1,
            preamble: 4,
        }
    }
}

impl RadioParameters {
    /// Bandwidth in Hz for the configured bandwidth code.
    pub fn bandwidth_hz(&self) -> Option<u32> {
        const TABLE: [u32; 10] = [
            7_800, 10_400, 15_600, 20_800, 31_250, 41_700, 62_500, 125_000, 250_000, 500_000,
        ];
        TABLE.get(self.bandwidth as usize).copied()
    }

    fn validate(&self, network_id: u8) -> ProtocolResult<()> {
        check("spreading factor", self.spreading_factor, 7..=12, "7-12")?;
        check("bandwidth", self.bandwidth, 0..=9, "0-9")?;
        check("coding rate", self.coding_rate, 1..=4, "1-4")?;
        let preamble_ok =
            (4..=7).contains(&self.preamble) || (self.preamble == 12 && network_id == 18);
        if !preamble_ok {
            return Err(ProtocolError::InvalidParameter {
                name: "preamble",
                value: self.preamble as i64,
                allowed: "4-7, or 12 on network 18",
            });
        }
        Ok(())
    }
}

/// Power mode for `AT+MODE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerMode {
    /// Transceiver mode (always listening).
    #[default]
    Transceiver,
    /// Sleep mode, woken by incoming UART data.
    Sleep,
}

impl PowerMode {
    /// The mode code sent to the module.
    pub fn code(&self) -> u8 {
        match self {
            PowerMode::Transceiver => 0,
            PowerMode::Sleep => 1,
        }
    }
}

/// Complete radio configuration applied at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RadioSettings {
    /// Modulation parameters.
    pub parameters: RadioParameters,
    /// Center frequency in Hz.
    pub band_hz: u32,
    /// Power mode.
    pub mode: PowerMode,
    /// Network identifier (0-16, or 18).
    pub network_id: u8,
    /// This module's address.
    pub address: Address,
    /// RF output power in dBm (0-15).
    pub output_power: u8,
}

impl Default for RadioSettings {
    fn default() -> Self {
        RadioSettings {
            parameters: RadioParameters::default(),
            band_hz: 868_500_000,
            mode: PowerMode::Transceiver,
            network_id: 3,
            address: Address::new(86),
            output_power: 0,
        }
    }
}

impl RadioSettings {
    /// Validate every field against the ranges the module accepts.
    pub fn validate(&self) -> ProtocolResult<()> {
        let network_ok = self.network_id <= 16 || self.network_id == 18;
        if !network_ok {
            return Err(ProtocolError::InvalidParameter {
                name: "network id",
                value: self.network_id as i64,
                allowed: "0-16 or 18",
            });
        }
        self.parameters.validate(self.network_id)?;
        if !(100_000_000..=1_000_000_000).contains(&self.band_hz) {
            return Err(ProtocolError::InvalidParameter {
                name: "band",
                value: self.band_hz as i64,
                allowed: "100000000-1000000000 Hz",
            });
        }
        check("output power", self.output_power, 0..=15, "0-15")?;
        Ok(())
    }

    /// The startup configuration commands, in the order the module requires.
    pub fn setup_commands(&self) -> ProtocolResult<Vec<AtCommand>> {
        self.validate()?;
        Ok(vec![
            AtCommand::Test,
            AtCommand::SetParameters(self.parameters),
            AtCommand::SetBand { hz: self.band_hz },
            AtCommand::SetMode(self.mode),
            AtCommand::SetNetworkId(self.network_id),
            AtCommand::SetAddress(self.address),
            AtCommand::SetOutputPower(self.output_power),
        ])
    }
}

fn check(
    name: &'static str,
    value: u8,
    range: std::ops::RangeInclusive<u8>,
    allowed: &'static str,
) -> ProtocolResult<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ProtocolError::InvalidParameter {
            name,
            value: value as i64,
            allowed,
        })
    }
}
