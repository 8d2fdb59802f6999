//! Logging setup.
//!
//! Events go to standard error so standard output stays free for the
//! protocol transport. `RUST_LOG` takes precedence over the directive the
//! caller supplies.

#![warn(missing_docs, clippy::pedantic)]

use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Directive used when neither `RUST_LOG` nor the caller picks one.
pub const DEFAULT_DIRECTIVE: &str = "info";

/// Result alias for telemetry setup.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Errors produced while installing the subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The filter directive could not be parsed.
    #[error("invalid log directive `{directive}`: {source}")]
    InvalidDirective {
        /// Directive as supplied.
        directive: String,
        /// Parser error.
        #[source]
        source: ParseError,
    },
}

/// Builds the filter: `RUST_LOG` when set and valid, `directive` otherwise.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidDirective`] when `directive` is needed
/// and does not parse.
pub fn env_filter(directive: &str) -> TelemetryResult<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(directive).map_err(|source| TelemetryError::InvalidDirective {
        directive: directive.to_owned(),
        source,
    })
}

/// Installs the global subscriber writing to standard error.
///
/// Returns `false` when a subscriber was already installed, which leaves
/// the existing one in place.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidDirective`] for an unparsable
/// directive.
pub fn init(directive: &str) -> TelemetryResult<bool> {
    let filter = env_filter(directive)?;
    let installed = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!(directive, "logging initialised");
    }
    Ok(installed)
}
