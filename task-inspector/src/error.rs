//! Errors produced while inspecting a Taskfile.

use thiserror::Error;

use crate::runner::RunnerError;

/// Result alias for inspection operations.
pub type InspectResult<T> = Result<T, InspectError>;

/// Failures that abort an inspection.
#[derive(Debug, Error)]
pub enum InspectError {
    /// The inspector was built with unusable settings.
    #[error("invalid inspector configuration: {reason}")]
    Configuration {
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Listing tasks failed at the process level.
    #[error("task discovery failed: {source}")]
    Discovery {
        /// Underlying runner failure.
        #[source]
        source: RunnerError,
    },

    /// The listing output could not be decoded.
    #[error("task listing is not valid JSON: {source}")]
    MalformedListing {
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },

    /// Fetching the summary of one task failed.
    #[error("failed to fetch details for task `{task}`: {source}")]
    Detail {
        /// Task whose summary could not be fetched.
        task: String,
        /// Underlying runner failure.
        #[source]
        source: RunnerError,
    },

    /// The runner reported data that violates the task model.
    #[error(transparent)]
    Model(#[from] task_primitives::Error),
}

impl InspectError {
    /// Convenience constructor for configuration issues.
    #[must_use]
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }
}
