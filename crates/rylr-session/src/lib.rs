//! RYLR Protocol Session Layer
//!
//! This crate drives a REYAX RYLR module over a byte-stream link using the
//! types from [`rylr_at`]. It covers:
//!
//! - **Line reading**: turning whatever the link delivers into complete lines,
//!   bounded by a timeout ([`LineReader`])
//! - **Command exchange**: send one AT command, wait for its reply, classify
//!   it ([`CommandSession`])
//! - **Startup configuration**: apply an ordered list of settings, each of
//!   which must be acknowledged with `+OK` ([`SetupSequence`])
//! - **Message dispatch**: answer inbound messages with an echo, a pong or the
//!   output of a local command ([`Dispatcher`])
//! - **Station loop**: the long-running receive/reply loop ([`Station`])
//!
//! Everything runs on the caller's thread. The only blocking points are the
//! bounded waits inside [`LineReader::read_lines`].
//!
//! # Example
//!
//! ```rust,ignore
//! use rylr_at::RadioSettings;
//! use rylr_session::{
//!     CommandSession, Dispatcher, ProcessExecutor, RunMode, SessionTimeouts, SetupSequence,
//!     Station, StreamTransport,
//! };
//!
//! let transport = StreamTransport::open_device("/dev/ttyACM0")?;
//! let session = CommandSession::new(transport, SessionTimeouts::default());
//! let dispatcher = Dispatcher::new(ProcessExecutor::default());
//! let mut station = Station::new(session, dispatcher, RunMode::Receiver);
//!
//! station.configure(&SetupSequence::from_settings(&RadioSettings::default())?)?;
//! station.run(&shutdown)?;
//! ```

mod dispatcher;
mod error;
mod executor;
mod line_reader;
mod session;
mod setup;
mod station;
pub mod telemetry;
mod transport;

pub use dispatcher::*;
pub use error::*;
pub use executor::*;
pub use line_reader::*;
pub use session::*;
pub use setup::*;
pub use station::*;
pub use transport::*;
