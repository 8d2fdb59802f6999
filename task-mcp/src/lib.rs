//! Model Context Protocol server publishing tasks as tools.
//!
//! [`TaskServerHandler`] lists one tool per task and answers every tool call
//! by running the task through a [`CommandExecutor`]. [`serve_stdio`] runs
//! it over standard input and output.

#![warn(missing_docs, clippy::pedantic)]

mod handler;

pub use handler::{HandlerSettings, TaskServerHandler, serve_stdio};

pub use task_tools::CommandExecutor;
