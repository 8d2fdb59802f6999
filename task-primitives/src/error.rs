//! Shared error definitions for task primitives.

use thiserror::Error;

/// Result alias used throughout the bridge.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while constructing task primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// Parameter name failed validation.
    #[error("invalid parameter name `{name}`: {reason}")]
    InvalidParameterName {
        /// The offending parameter name.
        name: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Task name failed validation.
    #[error("invalid task name `{name}`: {reason}")]
    InvalidTaskName {
        /// The offending task name.
        name: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// A task with the same name is already part of the catalog.
    #[error("task `{name}` appears more than once in the catalog")]
    DuplicateTask {
        /// Name of the duplicated task.
        name: String,
    },
}
