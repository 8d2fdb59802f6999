//! Introspection of an external task runner.
//!
//! The runner is treated as a black box: tasks are discovered from its
//! listing output, then each task's free-text summary is parsed into a
//! [`TaskDefinition`](task_primitives::TaskDefinition). Every process spawn
//! goes through the [`TaskRunner`] seam so the whole pipeline can be driven
//! without a real binary.

#![warn(missing_docs, clippy::pedantic)]

mod command;
mod discovery;
mod error;
mod inspector;
mod runner;
mod summary;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use command::{DEFAULT_RUNNER_BINARY, ListFormat, TaskfileTarget};
pub use discovery::{TaskDiscovery, parse_json_listing, parse_text_listing};
pub use error::{InspectError, InspectResult};
pub use inspector::{Inspector, InspectorBuilder};
pub use runner::{DEFAULT_TIMEOUT, ProcessRunner, RunOutput, RunnerError, RunnerResult, TaskRunner};
pub use summary::{TaskDetails, parse_summary};
