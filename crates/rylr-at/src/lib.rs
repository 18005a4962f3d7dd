//! REYAX RYLR AT Command Protocol
//!
//! This crate provides types and utilities for talking to REYAX RYLR LoRa
//! transceiver modules over their UART AT command interface. It performs no
//! I/O: bytes go in through [`LineCodec`], typed commands come out through
//! [`AtCommand::encode`].
//!
//! # Protocol Overview
//!
//! The AT protocol is a line-based text interface:
//!
//! - **Commands** (host → module): `AT` or `AT+<NAME>[=<args>]` terminated with `\r\n`
//! - **Acknowledgements** (module → host): `+OK`, or `+ERR=<code>` on failure
//! - **Query results** (module → host): `+<NAME>=<value>`
//! - **Inbound messages** (module → host): `+RCV=<sender>,<len>,<payload>,<rssi>,<snr>`
//!
//! The payload of an inbound message is length-prefixed and may itself contain
//! commas, so it is sliced by its declared length rather than split on
//! delimiters (see [`InboundMessage::decode`]).
//!
//! # Example
//!
//! ```rust
//! use rylr_at::{AtCommand, InboundMessage, OutboundMessage, Address};
//!
//! let msg = InboundMessage::decode("+RCV=12,4,ping,-80,10").unwrap().unwrap();
//! assert_eq!(msg.payload(), b"ping");
//!
//! let reply = OutboundMessage::new(msg.sender(), b"pong!".to_vec()).unwrap();
//! assert_eq!(AtCommand::Send(reply).encode(), b"AT+SEND=12,5,pong!\r\n");
//! # let _ = Address::new(0);
//! ```

mod codec;
mod commands;
mod error;
mod message;
mod radio;
mod responses;

pub use codec::*;
pub use commands::*;
pub use error::*;
pub use message::*;
pub use radio::*;
pub use responses::*;
