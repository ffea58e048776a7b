//! Logging setup.
//!
//! The library only emits `tracing` events; installing a subscriber is the
//! embedding program's call. [`init`] is the one-liner for binaries and
//! tests.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Builds the event filter: `RUST_LOG` when set, else the configured level.
#[must_use]
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Installs a global `fmt` subscriber writing to stderr.
///
/// Returns `false` if a global subscriber was already installed, in which
/// case the existing one stays in place.
pub fn init(config: &LoggingConfig) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_target(true)
        .with_writer(std::io::stderr);
    if config.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    }
}
