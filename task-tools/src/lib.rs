//! Tools derived from a task catalog.
//!
//! [`translator`] turns a [`TaskCatalog`](task_primitives::TaskCatalog) into
//! the descriptor shapes each consumer expects, [`executor`] runs a tool by
//! re-invoking the task runner, and [`registry`] exposes tasks to an agent
//! as invocable tools.

#![warn(missing_docs, clippy::pedantic)]

pub mod executor;
pub mod registry;
pub mod translator;

pub use executor::{
    ArgumentError, CommandExecutor, TaskRun, ToolCallRequest, ToolCallResult, parse_arguments,
};
pub use registry::{
    TaskTool, Tool, ToolError, ToolHandle, ToolMetadata, ToolRegistry, ToolResult, register_catalog,
};
pub use translator::{
    AgentToolDescriptor, McpParameter, McpToolDescriptor, RequiredPolicy, agent_descriptors,
    mcp_descriptors,
};
