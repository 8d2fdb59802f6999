use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use task_adapters::ProviderRegistry;
use task_bridge::Session;
use task_config::BridgeConfig;
use task_inspector::ListFormat;
use task_telemetry::DEFAULT_DIRECTIVE;
use tracing::info;

/// Publishes Taskfile tasks as MCP tools and as tools for an LLM agent.
#[derive(Parser, Debug)]
#[command(name = "tmcp", version, about)]
struct Cli {
    /// Configuration file (defaults to the per-user config directory)
    #[arg(long, global = true, env = "TMCP_CONFIG")]
    config: Option<PathBuf>,

    /// Task runner executable
    #[arg(long, global = true)]
    task_bin: Option<String>,

    /// Listing format used for discovery (json or text)
    #[arg(long, global = true)]
    list_format: Option<ListFormat>,

    /// Limit for one runner invocation, in seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = DEFAULT_DIRECTIVE)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the tasks of a Taskfile as MCP tools over stdio
    Serve {
        /// Path to the Taskfile
        taskfile: PathBuf,
    },

    /// Print the parsed task catalog as JSON
    Inspect {
        /// Path to the Taskfile
        taskfile: PathBuf,

        /// Indent the output
        #[arg(long)]
        pretty: bool,
    },

    /// Prepare an LLM agent with one tool per task
    Agent {
        /// Path to the Taskfile
        taskfile: PathBuf,

        /// LLM provider (openai or anthropic)
        #[arg(long)]
        provider: Option<String>,

        /// Model name passed to the provider
        #[arg(long)]
        model_name: Option<String>,

        /// Sampling temperature; 0 keeps the provider default
        #[arg(long)]
        temperature: Option<f32>,

        /// Output token budget; 0 keeps the provider default
        #[arg(long)]
        max_tokens: Option<u32>,

        /// Provider endpoint, e.g. an OpenAI-compatible local server
        #[arg(long)]
        base_url: Option<String>,

        /// Run the agent on this prompt after printing its configuration
        #[arg(long)]
        prompt: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    task_telemetry::init(&cli.log_level)?;

    let mut config = BridgeConfig::load(cli.config.as_deref()).context("failed to load config")?;
    if let Some(binary) = cli.task_bin {
        config.runner.binary = binary;
    }
    if let Some(format) = cli.list_format {
        config.runner.list_format = format;
    }
    if let Some(timeout) = cli.timeout_secs {
        config.runner.timeout_secs = timeout;
    }

    match cli.command {
        Commands::Serve { taskfile } => {
            let session = Session::load(config, &taskfile, None).await?;
            task_mcp::serve_stdio(session.mcp_handler()).await?;
        }
        Commands::Inspect { taskfile, pretty } => {
            let session = Session::load(config, &taskfile, None).await?;
            let json = if pretty {
                serde_json::to_string_pretty(session.catalog())
            } else {
                serde_json::to_string(session.catalog())
            }
            .context("failed to encode catalog")?;
            println!("{json}");
        }
        Commands::Agent {
            taskfile,
            provider,
            model_name,
            temperature,
            max_tokens,
            base_url,
            prompt,
        } => {
            if let Some(provider) = provider {
                config.agent.provider = provider;
            }
            if let Some(model) = model_name {
                config.agent.model = model;
            }
            if let Some(temperature) = temperature {
                config.agent.temperature = temperature;
            }
            if let Some(max_tokens) = max_tokens {
                config.agent.max_tokens = max_tokens;
            }
            if base_url.is_some() {
                config.agent.base_url = base_url;
            }

            let session = Session::load(config, &taskfile, None).await?;
            let agent = session.agent(&ProviderRegistry::with_builtin())?;
            println!("{}", agent.describe());

            if let Some(prompt) = prompt {
                let outcome = agent.run(&prompt).await?;
                info!(tool_calls = outcome.invocations.len(), "agent run complete");
                println!("\n{}", outcome.answer);
            }
        }
    }

    Ok(())
}
