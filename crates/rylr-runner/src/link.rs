//! Opening the link to the module.

use std::io;
use std::path::Path;
use std::process::Command;

use rylr_session::StreamTransport;
use tracing::{debug, info};

use crate::config::StationConfig;

/// Open the transport described by `config`.
///
/// A TCP endpoint takes precedence over the device node.
pub fn open_link(config: &StationConfig) -> io::Result<StreamTransport> {
    if let Some(addr) = &config.tcp {
        info!("Connecting to {}", addr);
        return StreamTransport::connect_tcp(addr.as_str());
    }

    if config.configure_tty {
        configure_tty(&config.device, config.baud)?;
    }
    info!("Opening {} at {} baud", config.device.display(), config.baud);
    StreamTransport::open_device(&config.device)
}

/// Put a serial device into raw mode at `baud` using `stty`.
pub fn configure_tty(device: &Path, baud: u32) -> io::Result<()> {
    let mut stty = Command::new("stty");
    stty.arg("-F")
        .arg(device)
        .arg(baud.to_string())
        .args(["raw", "-echo"]);
    debug!("Running {:?}", stty);

    let status = stty.status()?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::Other,
            format!("stty on {} failed with {}", device.display(), status),
        ))
    }
}
