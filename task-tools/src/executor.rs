//! Runs a tool by re-invoking the task runner.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use task_inspector::{RunnerError, TaskRunner, TaskfileTarget};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Name of the tool to run and the arguments to pass it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ToolCallRequest {
    tool: String,
    arguments: BTreeMap<String, String>,
}

impl ToolCallRequest {
    /// Creates a request without arguments.
    #[must_use]
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            arguments: BTreeMap::new(),
        }
    }

    /// Adds or replaces one argument.
    #[must_use]
    pub fn with_argument(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    /// Replaces every argument.
    #[must_use]
    pub fn with_arguments(mut self, arguments: BTreeMap<String, String>) -> Self {
        self.arguments = arguments;
        self
    }

    /// Replaces every argument with values taken from a JSON object.
    ///
    /// Strings pass through verbatim, other values are rendered as JSON
    /// text and `null` entries are dropped.
    #[must_use]
    pub fn with_json_arguments(mut self, arguments: &Map<String, Value>) -> Self {
        self.arguments = arguments
            .iter()
            .filter_map(|(key, value)| {
                let value = match value {
                    Value::Null => return None,
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                Some((key.clone(), value))
            })
            .collect();
        self
    }

    /// Tool name, identical to the task name.
    #[must_use]
    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Arguments ordered by key.
    #[must_use]
    pub fn arguments(&self) -> &BTreeMap<String, String> {
        &self.arguments
    }
}

/// Outcome of a tool call. A failed command is a normal result, not an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolCallResult {
    /// Captured standard output of a successful run.
    Success(String),
    /// Captured standard error of a command that exited unsuccessfully,
    /// or the failure description when the command never ran to completion.
    Failure(String),
}

impl ToolCallResult {
    /// The carried text, whichever variant this is.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Success(text) | Self::Failure(text) => text,
        }
    }

    /// Whether the command failed.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Consumes the result and returns the carried text.
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            Self::Success(text) | Self::Failure(text) => text,
        }
    }
}

/// Everything captured from one task run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskRun {
    /// The command exited with status zero.
    Completed {
        /// Standard output.
        stdout: String,
        /// Standard error, often progress lines from the runner.
        stderr: String,
    },
    /// The command ran and exited unsuccessfully.
    Exited {
        /// Exit description.
        reason: String,
        /// Standard output.
        stdout: String,
        /// Standard error.
        stderr: String,
    },
    /// The command was not started, could not be read or was killed.
    NotRun {
        /// What went wrong.
        reason: String,
    },
}

impl TaskRun {
    /// Whether the command exited with status zero.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Collapses the run to the protocol result: stdout on success, stderr
    /// verbatim (possibly empty) after a non-zero exit, the failure
    /// description otherwise.
    #[must_use]
    pub fn into_result(self) -> ToolCallResult {
        match self {
            Self::Completed { stdout, .. } => ToolCallResult::Success(stdout),
            Self::Exited { stderr, .. } => ToolCallResult::Failure(stderr),
            Self::NotRun { reason } => ToolCallResult::Failure(reason),
        }
    }
}

impl From<RunnerError> for TaskRun {
    fn from(err: RunnerError) -> Self {
        let reason = err.to_string();
        match err {
            RunnerError::Exit { stdout, stderr, .. } => Self::Exited {
                reason,
                stdout: String::from_utf8_lossy(&stdout).into_owned(),
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
            },
            _ => Self::NotRun { reason },
        }
    }
}

/// A `key=value` token that cannot become an argument.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ArgumentError {
    /// The token has no `=` or an empty key.
    #[error("invalid argument token `{0}`: expected key=value")]
    Malformed(String),
    /// The key was already given.
    #[error("argument `{0}` given more than once")]
    Repeated(String),
}

/// Executes tool calls against one Taskfile.
#[derive(Clone)]
pub struct CommandExecutor {
    runner: Arc<dyn TaskRunner>,
    target: TaskfileTarget,
}

impl fmt::Debug for CommandExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandExecutor")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl CommandExecutor {
    /// Creates an executor sharing the supplied runner.
    #[must_use]
    pub fn new(runner: Arc<dyn TaskRunner>, target: TaskfileTarget) -> Self {
        Self { runner, target }
    }

    /// Returns the runner binary and Taskfile calls are executed against.
    #[must_use]
    pub fn target(&self) -> &TaskfileTarget {
        &self.target
    }

    /// Runs `<runner> --taskfile <path> <tool> key=value...`.
    ///
    /// Arguments are passed in key order. Never fails: process errors are
    /// folded into [`ToolCallResult::Failure`].
    pub async fn execute(&self, request: &ToolCallRequest) -> ToolCallResult {
        self.run(request).await.into_result()
    }

    /// Like [`execute`](Self::execute) but keeps both output streams.
    pub async fn run(&self, request: &ToolCallRequest) -> TaskRun {
        let argv = self.target.execute_command(
            request.tool(),
            request
                .arguments()
                .iter()
                .map(|(key, value)| (key.as_str(), value.as_str())),
        );
        info!(tool = request.tool(), argument_count = request.arguments().len(), "executing task");

        match self.runner.invoke(&argv).await {
            Ok(output) => {
                debug!(tool = request.tool(), "task completed");
                TaskRun::Completed {
                    stdout: output.stdout_lossy().into_owned(),
                    stderr: String::from_utf8_lossy(output.stderr()).into_owned(),
                }
            }
            Err(err) => {
                warn!(tool = request.tool(), error = %err, "task failed");
                TaskRun::from(err)
            }
        }
    }

    /// Runs `tool` with arguments given as whitespace-separated
    /// `key=value` tokens.
    ///
    /// A malformed or repeated token fails the call without running
    /// anything.
    pub async fn run_text(&self, tool: &str, input: &str) -> TaskRun {
        match parse_arguments(input) {
            Ok(arguments) => {
                self.run(&ToolCallRequest::new(tool).with_arguments(arguments))
                    .await
            }
            Err(err) => {
                warn!(tool, error = %err, "rejecting argument text");
                TaskRun::NotRun {
                    reason: err.to_string(),
                }
            }
        }
    }
}

/// Splits `input` into `key=value` pairs at the first `=` of each token.
///
/// # Errors
///
/// Returns [`ArgumentError`] for the first token that has no `=`, has an
/// empty key or repeats an earlier key.
pub fn parse_arguments(input: &str) -> Result<BTreeMap<String, String>, ArgumentError> {
    let mut arguments = BTreeMap::new();
    for token in input.split_whitespace() {
        let Some((key, value)) = token.split_once('=').filter(|(key, _)| !key.is_empty()) else {
            return Err(ArgumentError::Malformed(token.to_owned()));
        };
        if arguments.insert(key.to_owned(), value.to_owned()).is_some() {
            return Err(ArgumentError::Repeated(key.to_owned()));
        }
    }
    Ok(arguments)
}
