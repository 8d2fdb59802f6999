//! Taskfile tasks as tools.
//!
//! Bundles the workspace crates behind one dependency and adds the pieces
//! the `tmcp` binary is made of: [`Session`], which turns a configuration
//! and a Taskfile into a catalog, and the [`TaskAgent`] loop.

#![warn(missing_docs, clippy::pedantic)]

pub mod agent;
pub mod bridge;

pub use agent::{AgentError, AgentOptions, AgentOutcome, AgentResult, TaskAgent};
pub use bridge::{BridgeError, BridgeResult, Session};

/// Task data model.
pub use task_primitives as primitives;

/// Runner introspection.
pub use task_inspector as inspector;

/// Descriptor translation, execution and the agent tool registry.
pub use task_tools as tools;

/// Model Context Protocol server.
pub use task_mcp as mcp;

/// Language model adapters.
pub use task_adapters as adapters;

/// Configuration loading.
pub use task_config as config;

/// Logging setup.
pub use task_telemetry as telemetry;
