//! Builds a [`TaskCatalog`] from a Taskfile.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use task_primitives::{TaskCatalog, TaskDefinition};
use tracing::{error, info, instrument};

use crate::command::{DEFAULT_RUNNER_BINARY, ListFormat, TaskfileTarget};
use crate::discovery::TaskDiscovery;
use crate::error::{InspectError, InspectResult};
use crate::runner::{DEFAULT_TIMEOUT, ProcessRunner, TaskRunner};
use crate::summary::TaskDetails;

/// Builder for [`Inspector`] instances.
pub struct InspectorBuilder {
    taskfile: PathBuf,
    binary: String,
    list_format: ListFormat,
    timeout: Duration,
    runner: Option<Arc<dyn TaskRunner>>,
}

impl InspectorBuilder {
    /// Starts a builder for the supplied Taskfile.
    #[must_use]
    pub fn new(taskfile: impl Into<PathBuf>) -> Self {
        Self {
            taskfile: taskfile.into(),
            binary: DEFAULT_RUNNER_BINARY.to_owned(),
            list_format: ListFormat::default(),
            timeout: DEFAULT_TIMEOUT,
            runner: None,
        }
    }

    /// Overrides the runner executable.
    #[must_use]
    pub fn binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Selects the listing format used for discovery.
    #[must_use]
    pub fn list_format(mut self, format: ListFormat) -> Self {
        self.list_format = format;
        self
    }

    /// Sets the per-invocation limit of the default [`ProcessRunner`].
    ///
    /// Ignored when a custom runner is installed.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Installs a custom runner in place of [`ProcessRunner`].
    #[must_use]
    pub fn runner(mut self, runner: Arc<dyn TaskRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Builds the [`Inspector`].
    ///
    /// # Errors
    ///
    /// Returns [`InspectError::Configuration`] when the Taskfile path or the
    /// runner binary is empty.
    pub fn build(self) -> InspectResult<Inspector> {
        if self.taskfile.as_os_str().is_empty() {
            return Err(InspectError::configuration("taskfile path must not be empty"));
        }
        if self.binary.trim().is_empty() {
            return Err(InspectError::configuration("runner binary must not be empty"));
        }

        let runner = self
            .runner
            .unwrap_or_else(|| Arc::new(ProcessRunner::new(self.timeout)));
        let target = TaskfileTarget::new(self.binary, self.taskfile);
        Ok(Inspector {
            discovery: TaskDiscovery::new(Arc::clone(&runner), target.clone(), self.list_format),
            details: TaskDetails::new(Arc::clone(&runner), target.clone()),
            runner,
            target,
        })
    }
}

/// Discovers tasks and parses their summaries into a catalog.
#[derive(Clone)]
pub struct Inspector {
    discovery: TaskDiscovery,
    details: TaskDetails,
    runner: Arc<dyn TaskRunner>,
    target: TaskfileTarget,
}

impl std::fmt::Debug for Inspector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inspector")
            .field("discovery", &self.discovery)
            .field("details", &self.details)
            .finish_non_exhaustive()
    }
}

impl Inspector {
    /// Creates a builder for the supplied Taskfile.
    #[must_use]
    pub fn builder(taskfile: impl Into<PathBuf>) -> InspectorBuilder {
        InspectorBuilder::new(taskfile)
    }

    /// Returns the runner binary and Taskfile this inspector targets.
    #[must_use]
    pub fn target(&self) -> &TaskfileTarget {
        &self.target
    }

    /// Returns the runner shared by every step.
    #[must_use]
    pub fn runner(&self) -> &Arc<dyn TaskRunner> {
        &self.runner
    }

    /// Lists task names in discovery order.
    ///
    /// # Errors
    ///
    /// See [`TaskDiscovery::discover`].
    pub async fn discover(&self) -> InspectResult<Vec<String>> {
        self.discovery.discover().await
    }

    /// Fetches and parses the summary of one task.
    ///
    /// # Errors
    ///
    /// See [`TaskDetails::details`].
    pub async fn details(&self, task_name: &str) -> InspectResult<TaskDefinition> {
        self.details.details(task_name).await
    }

    /// Discovers every task and fetches each summary in turn.
    ///
    /// The build is all-or-nothing: the first failing task aborts it.
    ///
    /// # Errors
    ///
    /// Returns [`InspectError::Discovery`] or [`InspectError::MalformedListing`]
    /// when listing fails, [`InspectError::Detail`] when a summary cannot be
    /// fetched, and [`InspectError::Model`] when a task name repeats.
    #[instrument(skip(self), fields(taskfile = %self.target.taskfile().display()))]
    pub async fn inspect(&self) -> InspectResult<TaskCatalog> {
        let names = self.discover().await?;
        let mut catalog = TaskCatalog::new();
        for name in &names {
            let definition = self.details(name).await.inspect_err(|err| {
                error!(task = %name, error = %err, "error getting task details");
            })?;
            catalog.push(definition)?;
        }
        info!(task_count = catalog.len(), "task catalog built");
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;

    const TASKFILE: &str = "Taskfile.yml";

    fn target() -> TaskfileTarget {
        TaskfileTarget::new("task", TASKFILE)
    }

    fn inspector(runner: ScriptedRunner) -> Inspector {
        Inspector::builder(TASKFILE)
            .runner(Arc::new(runner))
            .build()
            .unwrap()
    }

    fn listing(names: &[&str]) -> String {
        let tasks: Vec<String> = names
            .iter()
            .map(|name| format!(r#"{{"name": "{name}"}}"#))
            .collect();
        format!(r#"{{"tasks": [{}]}}"#, tasks.join(","))
    }

    #[tokio::test]
    async fn builds_catalog_in_discovery_order() {
        let runner = ScriptedRunner::new()
            .on_success(target().list_command(ListFormat::Json), listing(&["task1", "task2"]))
            .on_success(
                target().summary_command("task1"),
                "task: task1\nFirst task.\nUsage: task task1 A=1\n",
            )
            .on_success(target().summary_command("task2"), "task: task2\nSecond task.\n");

        let catalog = inspector(runner).inspect().await.unwrap();
        assert_eq!(catalog.names(), vec!["task1", "task2"]);
        let first = catalog.get("task1").unwrap();
        assert_eq!(first.description(), "First task.");
        assert_eq!(first.parameters().len(), 1);
        assert!(catalog.get("task2").unwrap().parameters().is_empty());
    }

    #[tokio::test]
    async fn zero_tasks_is_an_empty_catalog() {
        let runner = ScriptedRunner::new()
            .on_success(target().list_command(ListFormat::Json), r#"{"tasks": []}"#);
        let catalog = inspector(runner).inspect().await.unwrap();
        assert!(catalog.is_empty());
    }

    #[tokio::test]
    async fn failing_detail_aborts_the_whole_build() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .on_success(target().list_command(ListFormat::Json), listing(&["a", "b"]))
                .on_success(target().summary_command("a"), "Task a.\n")
                .on_failure(target().summary_command("b"), 1, "task b is broken"),
        );
        let inspector = Inspector::builder(TASKFILE)
            .runner(runner.clone())
            .build()
            .unwrap();

        let err = inspector.inspect().await.expect_err("b should fail the build");
        assert!(matches!(&err, InspectError::Detail { task, .. } if task == "b"));
        assert!(err.to_string().contains("task b is broken"));
        assert_eq!(runner.calls().len(), 3);
    }

    #[tokio::test]
    async fn discovery_failure_is_fatal() {
        let runner = ScriptedRunner::new().on_failure(
            target().list_command(ListFormat::Json),
            201,
            "task: No Taskfile found",
        );
        let err = inspector(runner).inspect().await.expect_err("listing should fail");
        assert!(matches!(err, InspectError::Discovery { .. }));
    }

    #[tokio::test]
    async fn duplicate_task_names_are_rejected() {
        let runner = ScriptedRunner::new()
            .on_success(target().list_command(ListFormat::Json), listing(&["a", "a"]))
            .on_success(target().summary_command("a"), "Task a.\n");
        let err = inspector(runner).inspect().await.expect_err("duplicate should fail");
        assert!(matches!(
            err,
            InspectError::Model(task_primitives::Error::DuplicateTask { .. })
        ));
    }

    #[tokio::test]
    async fn text_listing_mode() {
        let runner = ScriptedRunner::new()
            .on_success(target().list_command(ListFormat::Text), "* build: Build it\n")
            .on_success(target().summary_command("build"), "Build it.\n");
        let inspector = Inspector::builder(TASKFILE)
            .list_format(ListFormat::Text)
            .runner(Arc::new(runner))
            .build()
            .unwrap();
        let catalog = inspector.inspect().await.unwrap();
        assert_eq!(catalog.names(), vec!["build"]);
    }

    #[test]
    fn empty_taskfile_path_is_rejected() {
        let err = Inspector::builder("").build().expect_err("empty path");
        assert!(matches!(err, InspectError::Configuration { .. }));
    }

    #[test]
    fn custom_binary_flows_into_target() {
        let inspector = Inspector::builder("/srv/Taskfile.yml")
            .binary("go-task")
            .build()
            .unwrap();
        assert_eq!(inspector.target().binary(), "go-task");
        assert_eq!(
            inspector.target().taskfile(),
            std::path::Path::new("/srv/Taskfile.yml")
        );
    }
}
