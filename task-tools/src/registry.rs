//! Runtime registry of agent-invocable tools.

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use task_primitives::TaskCatalog;
use thiserror::Error;
use tracing::debug;

use crate::executor::{CommandExecutor, TaskRun, ToolCallRequest};
use crate::translator::{AgentToolDescriptor, agent_descriptors};

/// Result alias for registry calls.
pub type ToolResult<T> = Result<T, ToolError>;

/// Name and description under which a tool is offered to the model.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolMetadata {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

impl ToolMetadata {
    /// Metadata for a tool called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidMetadata`] if the name is empty.
    pub fn new(name: impl Into<String>) -> ToolResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ToolError::InvalidMetadata {
                reason: "tool name is blank".into(),
            });
        }

        Ok(Self {
            name,
            description: None,
        })
    }

    /// Attaches the text the model reads to decide when to call the tool.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description, when one was attached.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// Something the agent can call with a JSON value.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Runs the tool on `input`.
    async fn invoke(&self, input: Value) -> ToolResult<Value>;
}

#[async_trait]
impl<F, Fut> Tool for F
where
    F: Send + Sync + Fn(Value) -> Fut,
    Fut: Future<Output = ToolResult<Value>> + Send,
{
    async fn invoke(&self, input: Value) -> ToolResult<Value> {
        (self)(input).await
    }
}

/// Exposes one task as an agent tool.
///
/// Input is either a string of `key=value` tokens or a JSON object of
/// arguments; `null` runs the task without arguments. Output is a JSON
/// string holding the trimmed stdout, followed by stderr when the task
/// wrote any. A failing command is reported in the output text.
#[derive(Clone, Debug)]
pub struct TaskTool {
    descriptor: AgentToolDescriptor,
    executor: CommandExecutor,
}

impl TaskTool {
    /// Binds a descriptor to the executor that runs it.
    #[must_use]
    pub fn new(descriptor: AgentToolDescriptor, executor: CommandExecutor) -> Self {
        Self {
            descriptor,
            executor,
        }
    }

    /// Returns the descriptor this tool was built from.
    #[must_use]
    pub fn descriptor(&self) -> &AgentToolDescriptor {
        &self.descriptor
    }

    /// Registry metadata for this tool.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidMetadata`] if the task name is empty.
    pub fn metadata(&self) -> ToolResult<ToolMetadata> {
        Ok(ToolMetadata::new(self.descriptor.name())?
            .with_description(self.descriptor.description()))
    }
}

#[async_trait]
impl Tool for TaskTool {
    async fn invoke(&self, input: Value) -> ToolResult<Value> {
        let name = self.descriptor.name();
        debug!(tool = name, input = %input, "invoking task tool");
        let run = match &input {
            Value::Null => self.executor.run(&ToolCallRequest::new(name)).await,
            Value::String(text) => self.executor.run_text(name, text).await,
            Value::Object(arguments) => {
                let request = ToolCallRequest::new(name).with_json_arguments(arguments);
                self.executor.run(&request).await
            }
            other => {
                return Err(ToolError::InvalidInput {
                    reason: format!("expected a string or an object, got {other}"),
                });
            }
        };

        Ok(Value::String(render_run(name, &run)))
    }
}

fn render_run(name: &str, run: &TaskRun) -> String {
    match run {
        TaskRun::Completed { stdout, stderr } => {
            let (stdout, stderr) = (stdout.trim(), stderr.trim());
            if stderr.is_empty() {
                stdout.to_owned()
            } else {
                format!("Stdout:\n{stdout}\nStderr:\n{stderr}")
            }
        }
        TaskRun::Exited { reason, stdout, .. } => {
            let stdout = stdout.trim();
            if stdout.is_empty() {
                format!("Error executing task {name}: {reason}")
            } else {
                format!("Error executing task {name}: {reason}\nStdout:\n{stdout}")
            }
        }
        TaskRun::NotRun { reason } => format!("Error executing task {name}: {reason}"),
    }
}

/// A registered tool together with its metadata.
#[derive(Clone)]
pub struct ToolHandle {
    metadata: ToolMetadata,
    executor: Arc<dyn Tool>,
}

impl ToolHandle {
    /// Metadata the tool was registered with.
    #[must_use]
    pub fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    /// Calls the tool.
    ///
    /// # Errors
    ///
    /// Whatever the tool returns.
    pub async fn invoke(&self, input: Value) -> ToolResult<Value> {
        self.executor.invoke(input).await
    }
}

/// Registry that stores tool implementations keyed by name, in registration
/// order.
#[derive(Default)]
pub struct ToolRegistry {
    inner: RwLock<Vec<ToolHandle>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let names: Vec<_> = inner.iter().map(|handle| handle.metadata.name()).collect();
        f.debug_struct("ToolRegistry")
            .field("registered", &names)
            .finish()
    }
}

impl ToolRegistry {
    /// A registry with no tools.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `tool` under `metadata.name()`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateTool`] when the name is taken.
    pub fn register_tool<T>(&self, metadata: ToolMetadata, tool: T) -> ToolResult<()>
    where
        T: Tool + 'static,
    {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner
            .iter()
            .any(|handle| handle.metadata.name() == metadata.name())
        {
            return Err(ToolError::DuplicateTool {
                name: metadata.name().to_owned(),
            });
        }

        inner.push(ToolHandle {
            metadata,
            executor: Arc::new(tool),
        });

        Ok(())
    }

    /// Looks a tool up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<ToolHandle> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .iter()
            .find(|handle| handle.metadata.name() == name)
            .cloned()
    }

    /// Looks `name` up and calls it.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownTool`] for an unregistered name, otherwise
    /// whatever the tool returns.
    pub async fn invoke(&self, name: &str, input: Value) -> ToolResult<Value> {
        let handle = self.get(name).ok_or_else(|| ToolError::UnknownTool {
            name: name.to_owned(),
        })?;
        handle.invoke(input).await
    }

    /// Lists the metadata of all registered tools in registration order.
    #[must_use]
    pub fn list(&self) -> Vec<ToolMetadata> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.iter().map(|handle| handle.metadata.clone()).collect()
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no tool is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Registers a [`TaskTool`] for every task in `catalog`.
///
/// # Errors
///
/// Returns [`ToolError::DuplicateTool`] if a task name is already
/// registered.
pub fn register_catalog(
    registry: &ToolRegistry,
    catalog: &TaskCatalog,
    executor: &CommandExecutor,
) -> ToolResult<()> {
    for descriptor in agent_descriptors(catalog) {
        let tool = TaskTool::new(descriptor, executor.clone());
        registry.register_tool(tool.metadata()?, tool)?;
    }
    debug!(tool_count = registry.len(), "registered task tools");
    Ok(())
}

/// Registry and tool failures.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The tool name is blank.
    #[error("cannot register tool: {reason}")]
    InvalidMetadata {
        /// What is wrong.
        reason: String,
    },

    /// Two tools share a name.
    #[error("duplicate tool name `{name}`")]
    DuplicateTool {
        /// The shared name.
        name: String,
    },

    /// No tool has the requested name.
    #[error("unknown tool `{name}`")]
    UnknownTool {
        /// Name as requested.
        name: String,
    },

    /// The input value has a shape the tool cannot accept.
    #[error("invalid tool input: {reason}")]
    InvalidInput {
        /// Human-readable reason for rejection.
        reason: String,
    },
}
