//! RYLR Station Runner
//!
//! Everything between the command line and [`rylr_session::Station`]:
//!
//! - **Configuration**: YAML file with defaults for every field ([`StationConfig`])
//! - **Command line**: flags overriding the file ([`Args`])
//! - **Logging**: `tracing` subscriber setup ([`init_logging`])
//! - **Link**: serial device or TCP bridge ([`open_link`])
//! - **Modes**: the receive loop with Ctrl-C shutdown, and the interactive
//!   sender ([`run`], [`run_sender`])

mod app;
mod cli;
mod config;
mod link;
mod logging;

pub use app::*;
pub use cli::*;
pub use config::*;
pub use link::*;
pub use logging::*;
