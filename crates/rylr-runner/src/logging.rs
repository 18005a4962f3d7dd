//! Log output.

use tracing_subscriber::EnvFilter;

/// Filter used for a given number of `-v` flags.
pub fn verbosity_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber.
///
/// With no `-v`, `RUST_LOG` decides and defaults to `info`; any `-v` wins
/// over `RUST_LOG`. Records from crates using `log` are forwarded too.
/// Calling this twice is harmless.
pub fn init_logging(verbosity: u8) {
    let filter = if verbosity > 0 {
        EnvFilter::new(verbosity_filter(verbosity))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity_filter(0)))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
