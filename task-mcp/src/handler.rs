//! `rmcp::ServerHandler` over a task catalog.

use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, Implementation, ListToolsResult,
    PaginatedRequestParam, ProtocolVersion, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::{RequestContext, RoleServer, ServiceExt};
use rmcp::transport::io::stdio;
use rmcp::ErrorData as McpError;
use task_primitives::TaskCatalog;
use task_tools::{
    CommandExecutor, McpToolDescriptor, RequiredPolicy, ToolCallRequest, ToolCallResult,
    mcp_descriptors,
};
use tracing::{debug, info, warn};

/// Identity and descriptor options of the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandlerSettings {
    /// Name reported during initialization.
    pub name: String,
    /// Version reported during initialization.
    pub version: String,
    /// How parameter `required` flags are published.
    pub policy: RequiredPolicy,
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self {
            name: "tasks".to_owned(),
            version: "1.0.0".to_owned(),
            policy: RequiredPolicy::default(),
        }
    }
}

/// Serves one tool per task of a catalog.
#[derive(Clone, Debug)]
pub struct TaskServerHandler {
    descriptors: Arc<[McpToolDescriptor]>,
    executor: CommandExecutor,
    settings: HandlerSettings,
}

impl TaskServerHandler {
    /// Translates `catalog` into tool descriptors bound to `executor`.
    #[must_use]
    pub fn new(catalog: &TaskCatalog, executor: CommandExecutor, settings: HandlerSettings) -> Self {
        let descriptors: Arc<[McpToolDescriptor]> = mcp_descriptors(catalog, settings.policy).into();
        info!(tool_count = descriptors.len(), "registered task tools");
        Self {
            descriptors,
            executor,
            settings,
        }
    }

    /// Descriptors in catalog order.
    #[must_use]
    pub fn descriptors(&self) -> &[McpToolDescriptor] {
        &self.descriptors
    }

    /// Protocol tool definitions in catalog order.
    #[must_use]
    pub fn tools(&self) -> Vec<Tool> {
        self.descriptors
            .iter()
            .map(|descriptor| {
                Tool::new(
                    descriptor.name().to_owned(),
                    descriptor.description().to_owned(),
                    Arc::new(descriptor.input_schema()),
                )
            })
            .collect()
    }

    /// Runs the task named by `request`.
    ///
    /// A failing task yields an error *result*, not an protocol error.
    ///
    /// # Errors
    ///
    /// Returns an `invalid_params` error when no task has that name.
    pub async fn dispatch(&self, request: CallToolRequestParam) -> Result<CallToolResult, McpError> {
        let name = request.name.as_ref();
        if !self.descriptors.iter().any(|descriptor| descriptor.name() == name) {
            warn!(tool = name, "call for unknown tool");
            return Err(McpError::invalid_params(
                format!("unknown tool `{name}`"),
                None,
            ));
        }

        let mut call = ToolCallRequest::new(name);
        if let Some(arguments) = &request.arguments {
            call = call.with_json_arguments(arguments);
        }
        debug!(tool = name, arguments = ?call.arguments(), "dispatching tool call");

        Ok(match self.executor.execute(&call).await {
            ToolCallResult::Success(stdout) => CallToolResult::success(vec![Content::text(stdout)]),
            ToolCallResult::Failure(stderr) => CallToolResult::error(vec![Content::text(stderr)]),
        })
    }
}

impl rmcp::ServerHandler for TaskServerHandler {
    fn get_info(&self) -> ServerInfo {
        let mut server_info = Implementation::from_build_env();
        server_info.name.clone_from(&self.settings.name);
        server_info.version.clone_from(&self.settings.version);

        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info,
            instructions: Some(format!(
                "Each tool runs the task of the same name from {}. \
                 Arguments are passed to the task as NAME=value variables.",
                self.executor.target().taskfile().display()
            )),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(self.tools()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(request).await
    }
}

/// Serves `handler` on standard input and output until the client
/// disconnects.
///
/// # Errors
///
/// Returns an error if the session cannot be initialised or the service
/// task fails.
pub async fn serve_stdio(handler: TaskServerHandler) -> Result<()> {
    info!(
        name = %handler.settings.name,
        version = %handler.settings.version,
        "serving tasks on stdio"
    );
    let service = handler
        .serve(stdio())
        .await
        .context("failed to start MCP service")?;
    let reason = service.waiting().await.context("MCP service failed")?;
    info!(?reason, "server shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use rmcp::ServerHandler;
    use rmcp::model::{JsonObject, RawContent};
    use serde_json::json;
    use task_inspector::TaskfileTarget;
    use task_inspector::testing::ScriptedRunner;
    use task_primitives::{TaskDefinition, TaskParameter};

    fn target() -> TaskfileTarget {
        TaskfileTarget::new("task", "/work/Taskfile.yml")
    }

    fn catalog() -> TaskCatalog {
        TaskCatalog::from_tasks([
            TaskDefinition::builder("weather")
                .unwrap()
                .description("Retrieve a weather forecast.")
                .usage("task weather ZIPCODE=<zip> UNITS=metric")
                .parameter(
                    TaskParameter::new("ZIPCODE")
                        .unwrap()
                        .with_description("The zipcode."),
                )
                .parameter(TaskParameter::new("UNITS").unwrap().with_required(false))
                .build(),
            TaskDefinition::builder("clean")
                .unwrap()
                .description("Remove build output.")
                .build(),
        ])
        .unwrap()
    }

    fn handler(runner: ScriptedRunner, settings: HandlerSettings) -> TaskServerHandler {
        let executor = CommandExecutor::new(Arc::new(runner), target());
        TaskServerHandler::new(&catalog(), executor, settings)
    }

    fn call(name: &str, arguments: Option<serde_json::Value>) -> CallToolRequestParam {
        CallToolRequestParam {
            name: name.to_owned().into(),
            arguments: arguments.map(|value| match value {
                serde_json::Value::Object(map) => map,
                _ => JsonObject::new(),
            }),
        }
    }

    fn text(result: &CallToolResult) -> &str {
        match &result.content[0].raw {
            RawContent::Text(text) => &text.text,
            _ => panic!("expected text content"),
        }
    }

    #[test]
    fn lists_one_tool_per_task() {
        let tools = handler(ScriptedRunner::new(), HandlerSettings::default()).tools();
        let names: Vec<_> = tools.iter().map(|tool| tool.name.as_ref()).collect();
        assert_eq!(names, vec!["weather", "clean"]);

        let weather = &tools[0];
        assert_eq!(
            weather.description.as_deref(),
            Some("Retrieve a weather forecast.")
        );
        assert_eq!(
            weather.input_schema.get("required"),
            Some(&json!(["ZIPCODE", "UNITS"]))
        );
        assert_eq!(
            weather.input_schema["properties"]["ZIPCODE"],
            json!({"type": "string", "description": "The zipcode."})
        );
    }

    #[test]
    fn honor_policy_relaxes_optional_parameters() {
        let settings = HandlerSettings {
            policy: RequiredPolicy::HonorTaskFlags,
            ..HandlerSettings::default()
        };
        let tools = handler(ScriptedRunner::new(), settings).tools();
        assert_eq!(tools[0].input_schema.get("required"), Some(&json!(["ZIPCODE"])));
    }

    #[tokio::test]
    async fn successful_call_returns_stdout() {
        let runner = ScriptedRunner::new().on_success(
            target().execute_command("weather", [("UNITS", "metric"), ("ZIPCODE", "94110")]),
            "Sunny\n",
        );
        let result = handler(runner, HandlerSettings::default())
            .dispatch(call(
                "weather",
                Some(json!({"ZIPCODE": "94110", "UNITS": "metric"})),
            ))
            .await
            .unwrap();
        assert_ne!(result.is_error, Some(true));
        assert_eq!(text(&result), "Sunny\n");
    }

    #[tokio::test]
    async fn failing_task_is_an_error_result() {
        let runner =
            ScriptedRunner::new().on_failure(target().execute_command("clean", []), 1, "permission denied");
        let result = handler(runner, HandlerSettings::default())
            .dispatch(call("clean", None))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
        assert_eq!(text(&result), "permission denied");
    }

    #[tokio::test]
    async fn scalar_arguments_are_stringified_and_nulls_dropped() {
        let runner = Arc::new(ScriptedRunner::new());
        let executor = CommandExecutor::new(runner.clone(), target());
        let handler = TaskServerHandler::new(&catalog(), executor, HandlerSettings::default());

        let _ = handler
            .dispatch(call(
                "weather",
                Some(json!({"ZIPCODE": 94110, "UNITS": null})),
            ))
            .await
            .unwrap();
        assert_eq!(
            runner.calls(),
            vec![target().execute_command("weather", [("ZIPCODE", "94110")])]
        );
    }

    #[tokio::test]
    async fn unknown_tool_is_invalid_params() {
        let runner = Arc::new(ScriptedRunner::new());
        let executor = CommandExecutor::new(runner.clone(), target());
        let handler = TaskServerHandler::new(&catalog(), executor, HandlerSettings::default());

        let err = handler
            .dispatch(call("deploy", None))
            .await
            .expect_err("unknown tool should fail");
        assert!(err.message.contains("deploy"));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn info_reports_configured_identity() {
        let settings = HandlerSettings {
            name: "build-tasks".into(),
            version: "2.1.0".into(),
            ..HandlerSettings::default()
        };
        let info = handler(ScriptedRunner::new(), settings).get_info();
        assert_eq!(info.server_info.name, "build-tasks");
        assert_eq!(info.server_info.version, "2.1.0");
        assert!(info.capabilities.tools.is_some());
        assert!(info.instructions.unwrap().contains("/work/Taskfile.yml"));
    }
}
