//! Core shared types for bridging task runner tasks into tools.

#![warn(missing_docs, clippy::pedantic)]

mod catalog;
mod error;
mod task;

/// Ordered, name-unique collection of task definitions.
pub use catalog::TaskCatalog;
/// Error type and result alias shared across the workspace.
pub use error::{Error, Result};
/// Task definitions and their parameters.
pub use task::{TaskDefinition, TaskDefinitionBuilder, TaskParameter};
