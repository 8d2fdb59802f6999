use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use serde_json::{Value, json};
use task_adapters::{
    AdapterMetadata, AdapterResult, AdapterStream, InferenceChunk, InferenceRequest, MessageRole,
    ModelAdapter, ProviderRegistry, ProviderSettings,
};
use task_bridge::{BridgeError, Session};
use task_config::BridgeConfig;
use task_inspector::testing::ScriptedRunner;
use task_inspector::{ListFormat, TaskRunner, TaskfileTarget};

const LISTING: &str = r#"{"tasks": [
    {"name": "weather", "desc": "Retrieve a weather forecast."},
    {"name": "clean", "desc": "Remove build output."}
]}"#;

const WEATHER_SUMMARY: &str = "task: weather
Retrieve a weather forecast for the provided ZIPCODE.
Usage: task weather ZIPCODE=<zip> UNITS=metric
Required:
  ZIPCODE: The zipcode to get the weather for.
";

const CLEAN_SUMMARY: &str = "task: clean
Remove build output.
";

fn scripted(taskfile: &Path) -> (Arc<ScriptedRunner>, TaskfileTarget) {
    let target = TaskfileTarget::new("task", taskfile);
    let runner = ScriptedRunner::new()
        .on_success(target.list_command(ListFormat::Json), LISTING)
        .on_success(target.summary_command("weather"), WEATHER_SUMMARY)
        .on_success(target.summary_command("clean"), CLEAN_SUMMARY)
        .on_success(
            target.execute_command("weather", [("ZIPCODE", "94110")]),
            "Sunny, 21C\n",
        )
        .on_failure(target.execute_command("clean", []), 201, "task: Failed to run task \"clean\"");
    (Arc::new(runner), target)
}

async fn load(taskfile: &Path, runner: &Arc<ScriptedRunner>, config: BridgeConfig) -> Session {
    let shared: Arc<dyn TaskRunner> = runner.clone();
    Session::load(config, taskfile, Some(shared)).await.unwrap()
}

#[tokio::test]
async fn catalog_reaches_both_tool_surfaces() {
    let taskfile = tempfile::NamedTempFile::new().unwrap();
    let (runner, _) = scripted(taskfile.path());
    let session = load(taskfile.path(), &runner, BridgeConfig::default()).await;

    assert_eq!(session.catalog().names(), vec!["weather", "clean"]);

    let tools = session.mcp_handler().tools();
    assert_eq!(tools.len(), 2);
    assert_eq!(tools[0].name, "weather");
    assert_eq!(
        tools[0].input_schema.get("required"),
        Some(&json!(["ZIPCODE", "UNITS"]))
    );

    let registry = session.tool_registry().unwrap();
    let listed: Vec<_> = registry.list().into_iter().map(|tool| tool.name().to_owned()).collect();
    assert_eq!(listed, vec!["weather", "clean"]);
    assert_eq!(
        registry.get("weather").unwrap().metadata().description(),
        Some(
            "Retrieve a weather forecast for the provided ZIPCODE. \
             Usage: task weather ZIPCODE=<zip> UNITS=metric"
        )
    );
}

#[tokio::test]
async fn registry_tools_run_the_task() {
    let taskfile = tempfile::NamedTempFile::new().unwrap();
    let (runner, target) = scripted(taskfile.path());
    let session = load(taskfile.path(), &runner, BridgeConfig::default()).await;
    let registry = session.tool_registry().unwrap();

    let output = registry
        .invoke("weather", Value::String("ZIPCODE=94110".into()))
        .await
        .unwrap();
    assert_eq!(output, json!("Sunny, 21C"));

    let output = registry.invoke("clean", Value::Null).await.unwrap();
    assert_eq!(
        output,
        json!(
            "Error executing task clean: `task` exited with status 201: \
             task: Failed to run task \"clean\""
        )
    );

    assert_eq!(
        runner.calls().last(),
        Some(&target.execute_command("clean", []))
    );
}

#[tokio::test]
async fn honoring_required_flags_reaches_the_schema() {
    let taskfile = tempfile::NamedTempFile::new().unwrap();
    let (runner, _) = scripted(taskfile.path());
    let mut config = BridgeConfig::default();
    config.server.honor_required_flags = true;
    config.server.name = "weather-tasks".into();
    let session = load(taskfile.path(), &runner, config).await;

    let handler = session.mcp_handler();
    assert_eq!(
        handler.tools()[0].input_schema.get("required"),
        Some(&json!(["ZIPCODE"]))
    );
}

#[tokio::test]
async fn failed_summary_aborts_the_session() {
    let taskfile = tempfile::NamedTempFile::new().unwrap();
    let target = TaskfileTarget::new("task", taskfile.path());
    let runner = Arc::new(
        ScriptedRunner::new()
            .on_success(target.list_command(ListFormat::Json), LISTING)
            .on_success(target.summary_command("weather"), WEATHER_SUMMARY)
            .on_failure(target.summary_command("clean"), 1, "task: no such task"),
    );
    let shared: Arc<dyn TaskRunner> = runner.clone();

    let err = Session::load(BridgeConfig::default(), taskfile.path(), Some(shared))
        .await
        .expect_err("summary failure");
    assert!(matches!(err, BridgeError::Inspect(_)));
    assert!(err.to_string().contains("clean"));
}

/// Calls `weather` on the first turn and answers with the tool output on
/// the next.
struct ForecastModel {
    metadata: AdapterMetadata,
}

#[async_trait]
impl ModelAdapter for ForecastModel {
    fn metadata(&self) -> &AdapterMetadata {
        &self.metadata
    }

    async fn infer(&self, request: InferenceRequest) -> AdapterResult<AdapterStream> {
        let last = request.messages().last().unwrap();
        let reply = match last.role() {
            MessageRole::Tool => format!("Forecast: {}", last.content()),
            _ => "CALL weather ZIPCODE=94110".to_owned(),
        };
        Ok(Box::pin(stream::iter(vec![Ok(InferenceChunk::new(reply, true))])))
    }
}

fn forecast_model(settings: &ProviderSettings) -> AdapterResult<Arc<dyn ModelAdapter>> {
    Ok(Arc::new(ForecastModel {
        metadata: AdapterMetadata::new("forecast", settings.model()),
    }))
}

#[tokio::test]
async fn agent_answers_with_task_output() {
    let taskfile = tempfile::NamedTempFile::new().unwrap();
    let (runner, _) = scripted(taskfile.path());
    let mut config = BridgeConfig::default();
    config.agent.provider = "forecast".into();
    config.agent.model = "local".into();
    let session = load(taskfile.path(), &runner, config).await;

    let mut providers = ProviderRegistry::empty();
    providers.register("forecast", forecast_model);
    let agent = session.agent(&providers).unwrap();

    let report = agent.describe();
    assert!(report.contains("Provider: forecast"));
    assert!(report.contains("Model Name (configured in LLM client): local"));
    assert!(report.contains("    Name: clean"));

    let outcome = agent.run("What is the weather in 94110?").await.unwrap();
    assert_eq!(outcome.answer, "Forecast: Sunny, 21C");
    assert_eq!(outcome.invocations.len(), 1);
    assert_eq!(outcome.invocations[0].name, "weather");
}

#[tokio::test]
async fn unknown_provider_is_reported() {
    let taskfile = tempfile::NamedTempFile::new().unwrap();
    let (runner, _) = scripted(taskfile.path());
    let mut config = BridgeConfig::default();
    config.agent.provider = "gemini".into();
    let session = load(taskfile.path(), &runner, config).await;

    let err = session
        .agent(&ProviderRegistry::with_builtin())
        .expect_err("unknown provider");
    assert!(matches!(err, BridgeError::Adapter(_)));
}

#[tokio::test]
async fn agent_base_url_reaches_the_provider() {
    let taskfile = tempfile::NamedTempFile::new().unwrap();
    let (runner, _) = scripted(taskfile.path());
    let mut config = BridgeConfig::default();
    config.agent.provider = "openai".into();
    config.agent.base_url = Some("localhost:11434".into());
    config.agent.timeout_secs = Some(90);
    let session = load(taskfile.path(), &runner, config).await;

    let err = session
        .agent(&ProviderRegistry::with_builtin())
        .expect_err("base URL without scheme");
    assert!(matches!(err, BridgeError::Adapter(_)));
    assert!(err.to_string().contains("base URL must start with http"));
}
