//! Structured logging using the tracing crate.
//!
//! Log lines go to stderr so stdout stays reserved for command output
//! (the recorded file path, config values). The level filter comes from
//! `MICPULSE_LOG`, then `RUST_LOG`, then the verbosity flag.

use std::io::IsTerminal;

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Environment variable with the crate's own filter directives
pub const LOG_ENV: &str = "MICPULSE_LOG";

/// Initializes the global subscriber.
///
/// # Errors
/// - If a global subscriber was already installed
pub fn init_logging(verbose: bool) -> Result<(), String> {
    let default_level = if verbose { "micpulse=debug,info" } else { "warn" };

    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose)
                .with_thread_names(verbose)
                .with_ansi(std::io::stderr().is_terminal()),
        )
        .try_init()
        .map_err(|e| format!("Logging already initialized: {}", e))?;

    tracing::debug!("Logging initialized");
    Ok(())
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level))
}
