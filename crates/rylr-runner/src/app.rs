//! Station wiring: open the link, configure the module, run the chosen mode.

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rylr_at::{Address, OutboundMessage, ProtocolError};
use rylr_session::{
    telemetry, CommandSession, DisabledExecutor, Dispatcher, Executor, ProcessExecutor, RunMode,
    SessionError, Station, Transport,
};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::cli::Args;
use crate::config::{ConfigError, StationConfig};
use crate::link::open_link;
use crate::logging::init_logging;

/// Input that ends an interactive sender session.
pub const QUIT: &str = "quit";

/// Errors that end the program.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Bad configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The link could not be opened.
    #[error("failed to open {link}: {source}")]
    Link {
        /// Device path or TCP endpoint.
        link: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The session failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The Ctrl-C handler could not be installed.
    #[error("failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),

    /// Console I/O failed.
    #[error("console error: {0}")]
    Console(#[from] io::Error),
}

/// One line of sender input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Nothing to do.
    Blank,
    /// End the session.
    Quit,
    /// Transmit this message.
    Send(OutboundMessage),
}

/// Why a line of sender input was rejected.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The first word is not an address.
    #[error("expected `<address> <text>`, got address {0:?}")]
    BadAddress(String),

    /// The text cannot be transmitted.
    #[error(transparent)]
    Payload(#[from] ProtocolError),
}

/// Parse `<address> <text>`. The text may be empty or contain spaces.
pub fn parse_request(line: &str) -> Result<Request, RequestError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Request::Blank);
    }
    if line.eq_ignore_ascii_case(QUIT) {
        return Ok(Request::Quit);
    }

    let (address, text) = line
        .split_once(char::is_whitespace)
        .map(|(address, text)| (address, text.trim_start()))
        .unwrap_or((line, ""));
    let address: Address = address
        .parse()
        .map_err(|_| RequestError::BadAddress(address.to_string()))?;
    Ok(Request::Send(OutboundMessage::new(address, text)?))
}

/// Run the program with parsed arguments.
pub fn run(args: Args) -> Result<(), RunnerError> {
    init_logging(args.verbose);
    let config = args.load_config()?;

    if args.print_config {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }

    telemetry::describe_metrics();

    let transport = open_link(&config).map_err(|source| RunnerError::Link {
        link: config.link_name(),
        source,
    })?;
    let session = CommandSession::new(transport, config.timeouts.session());

    let executor: Box<dyn Executor> = if config.exec.enabled {
        Box::new(ProcessExecutor::new(config.timeouts.exec()))
    } else {
        info!("Remote execution disabled");
        Box::new(DisabledExecutor)
    };

    let mode = config.mode()?;
    let mut station = Station::new(session, Dispatcher::new(executor), mode)
        .with_idle_poll(config.timeouts.idle_poll());

    let result = run_station(&mut station, &config);
    if let Err(e) = station.close() {
        warn!("Failed to close {}: {}", config.link_name(), e);
    }
    result
}

fn run_station<T: Transport, E: Executor>(
    station: &mut Station<T, E>,
    config: &StationConfig,
) -> Result<(), RunnerError> {
    station.configure(&config.setup_sequence()?)?;

    match station.mode() {
        RunMode::Receiver => {
            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = shutdown.clone();
            ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))?;
            station.run(&shutdown)?;
        }
        RunMode::Sender => {
            let stdin = io::stdin();
            let stdout = io::stdout();
            run_sender(station, stdin.lock(), stdout.lock())?;
        }
    }
    Ok(())
}

/// Interactive sender: read requests from `input`, report replies to `output`.
///
/// Bad input and failed transmissions are reported and the session goes on;
/// only a link failure ends it early.
pub fn run_sender<T, E, R, W>(
    station: &mut Station<T, E>,
    input: R,
    mut output: W,
) -> Result<(), RunnerError>
where
    T: Transport,
    E: Executor,
    R: BufRead,
    W: Write,
{
    writeln!(output, "Enter `<address> <text>`, `{}` to stop.", QUIT)?;
    for line in input.lines() {
        let message = match parse_request(&line?) {
            Ok(Request::Blank) => continue,
            Ok(Request::Quit) => break,
            Ok(Request::Send(message)) => message,
            Err(e) => {
                writeln!(output, "error: {}", e)?;
                continue;
            }
        };

        match station.send_and_await(&message) {
            Ok(Some(reply)) => writeln!(
                output,
                "{} (rssi {}, snr {}): {}",
                reply.sender(),
                reply.rssi(),
                reply.snr(),
                reply.payload_str()
            )?,
            Ok(None) => writeln!(output, "no reply from {}", message.destination())?,
            Err(e) if e.is_recoverable() => {
                error!("Send to {} failed: {}", message.destination(), e);
                writeln!(output, "error: {}", e)?;
            }
            Err(e) => return Err(e.into()),
        }
        output.flush()?;
    }
    Ok(())
}
