//! # Structured Logging
//!
//! The ledger only emits `tracing` events (`caller`, `amount`,
//! `new_balance`, `sequence`, `reason` fields); installing a subscriber is
//! the host's job. This module is the one-call way to do it.
//!
//! `RUST_LOG` overrides the filter directive when set. Hosts and test
//! binaries may race to install a subscriber, so losing the race is an
//! error value, not a panic.

use thiserror::Error;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset: ledger events at `info`, i.e.
/// commits, rejections and rolled-back transfers.
pub const DEFAULT_DIRECTIVE: &str = "custody_ledger=info";

/// Where and how log lines are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable output on stderr.
    Pretty,
    /// One flattened JSON object per event on stderr, for log aggregation.
    /// Event fields sit at the top level next to `level` and `target`.
    Json,
    /// Compact output routed through the test harness, so it is captured
    /// per test and shown only on failure.
    Test,
}

/// Failure to install the global subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// A global subscriber is already installed.
    #[error("tracing subscriber already initialized: {0}")]
    AlreadyInitialized(#[from] TryInitError),
}

/// Installs the global subscriber with [`DEFAULT_DIRECTIVE`].
///
/// # Errors
///
/// [`LoggingError::AlreadyInitialized`] if a global subscriber is already
/// set. Logging keeps going through the existing one.
pub fn init_logging(format: LogFormat) -> Result<(), LoggingError> {
    init_logging_with(DEFAULT_DIRECTIVE, format)
}

/// Installs the global subscriber, filtering with `directive` unless
/// `RUST_LOG` is set, e.g. `"custody_ledger=debug"` to also see debits
/// before their transfer settles.
///
/// # Errors
///
/// Same as [`init_logging`].
pub fn init_logging_with(directive: &str, format: LogFormat) -> Result<(), LoggingError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init()?,
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
        LogFormat::Test => registry
            .with(fmt::layer().compact().with_test_writer())
            .try_init()?,
    }

    tracing::debug!(?format, directive, "ledger logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_reports_error() {
        // Whichever call wins, a subscriber is installed after the first one.
        let _ = init_logging(LogFormat::Test);
        let second = init_logging_with("custody_ledger=debug", LogFormat::Json);
        assert!(matches!(second, Err(LoggingError::AlreadyInitialized(_))));
    }

    #[test]
    fn default_directive_parses() {
        assert!(DEFAULT_DIRECTIVE.parse::<tracing_subscriber::filter::Directive>().is_ok());
    }
}
