//! Wiring from configuration to a loaded task catalog and its consumers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use task_adapters::{AdapterError, ProviderRegistry, ProviderSettings};
use task_config::{BridgeConfig, ConfigError};
use task_inspector::{InspectError, Inspector, TaskRunner};
use task_mcp::{HandlerSettings, TaskServerHandler};
use task_primitives::TaskCatalog;
use task_tools::{CommandExecutor, RequiredPolicy, ToolError, ToolRegistry, register_catalog};
use thiserror::Error;
use tracing::{info, instrument};

use crate::agent::{AgentOptions, TaskAgent};

/// Result alias for bridge setup.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors raised while preparing a session.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The Taskfile does not exist or is not a file.
    #[error("taskfile {} not found", .path.display())]
    MissingTaskfile {
        /// Path as given.
        path: PathBuf,
    },

    /// Configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Task discovery or summary parsing failed.
    #[error("failed to inspect tasks: {0}")]
    Inspect(#[from] InspectError),

    /// Tools could not be registered.
    #[error("failed to register tools: {0}")]
    Tool(#[from] ToolError),

    /// The language model client could not be built.
    #[error("failed to initialize LLM client: {0}")]
    Adapter(#[from] AdapterError),
}

/// A Taskfile inspected under one configuration.
#[derive(Clone, Debug)]
pub struct Session {
    config: BridgeConfig,
    inspector: Inspector,
    catalog: TaskCatalog,
}

impl Session {
    /// Validates `config`, checks the Taskfile exists and builds its
    /// catalog. `runner` replaces the process runner when given.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError`] for invalid configuration, a missing
    /// Taskfile or a failed inspection.
    #[instrument(skip(config, runner), fields(taskfile = %taskfile.display()))]
    pub async fn load(
        config: BridgeConfig,
        taskfile: &Path,
        runner: Option<Arc<dyn TaskRunner>>,
    ) -> BridgeResult<Self> {
        config.validate()?;
        if !taskfile.is_file() {
            return Err(BridgeError::MissingTaskfile {
                path: taskfile.to_owned(),
            });
        }

        let mut builder = Inspector::builder(taskfile)
            .binary(config.runner.binary.clone())
            .list_format(config.runner.list_format)
            .timeout(config.runner.timeout());
        if let Some(runner) = runner {
            builder = builder.runner(runner);
        }
        let inspector = builder.build()?;
        let catalog = inspector.inspect().await?;
        info!(task_count = catalog.len(), "taskfile inspected");

        Ok(Self {
            config,
            inspector,
            catalog,
        })
    }

    /// Configuration in effect.
    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Tasks found in the Taskfile.
    #[must_use]
    pub fn catalog(&self) -> &TaskCatalog {
        &self.catalog
    }

    /// Executor running tasks through the inspector's runner.
    #[must_use]
    pub fn executor(&self) -> CommandExecutor {
        CommandExecutor::new(
            Arc::clone(self.inspector.runner()),
            self.inspector.target().clone(),
        )
    }

    /// Protocol handler publishing every task.
    #[must_use]
    pub fn mcp_handler(&self) -> TaskServerHandler {
        let settings = HandlerSettings {
            name: self.config.server.name.clone(),
            version: self.config.server.version.clone(),
            policy: RequiredPolicy::from_honor_flags(self.config.server.honor_required_flags),
        };
        TaskServerHandler::new(&self.catalog, self.executor(), settings)
    }

    /// Agent tool registry holding one tool per task.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Tool`] if a task cannot be registered.
    pub fn tool_registry(&self) -> BridgeResult<ToolRegistry> {
        let registry = ToolRegistry::new();
        register_catalog(&registry, &self.catalog, &self.executor())?;
        Ok(registry)
    }

    /// Builds the agent with the adapter named by `agent.provider`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Adapter`] for an unknown provider or a bad
    /// adapter configuration, and [`BridgeError::Tool`] if registration
    /// fails.
    pub fn agent(&self, providers: &ProviderRegistry) -> BridgeResult<TaskAgent> {
        let agent = &self.config.agent;
        let mut settings = ProviderSettings::new(agent.model.clone())
            .with_temperature(agent.temperature)
            .with_max_tokens(agent.max_tokens);
        if let Some(base_url) = &agent.base_url {
            settings = settings.with_base_url(base_url.clone());
        }
        if let Some(timeout) = agent.timeout() {
            settings = settings.with_timeout(timeout);
        }
        let adapter = providers.build(&agent.provider, &settings)?;
        let options = AgentOptions {
            max_steps: agent.max_steps,
            temperature: settings.temperature(),
            max_tokens: settings.max_tokens(),
        };
        Ok(TaskAgent::new(
            adapter,
            Arc::new(self.tool_registry()?),
            options,
        ))
    }
}
