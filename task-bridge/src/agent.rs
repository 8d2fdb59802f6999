//! Tool-using agent loop over the task registry.
//!
//! The model sees every tool in its system prompt and answers each turn
//! either with a directive line
//!
//! ```text
//! CALL <tool> KEY=value ...
//! ```
//!
//! or with free text, which ends the run as the final answer. Tool output is
//! fed back as a tool message before the next turn.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use task_adapters::{AdapterError, InferenceRequest, ModelAdapter, PromptMessage, collect_text};
use task_tools::ToolRegistry;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Prefix marking a tool invocation in a model reply.
pub const CALL_PREFIX: &str = "CALL";

/// Result alias for agent runs.
pub type AgentResult<T> = Result<T, AgentError>;

/// Errors that end an agent run.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The model adapter failed.
    #[error("adapter `{provider}` for model `{model}` error: {source}")]
    Adapter {
        /// Provider of the failing adapter.
        provider: &'static str,
        /// Model identifier.
        model: String,
        /// Adapter error.
        #[source]
        source: AdapterError,
    },

    /// The model kept calling tools past the step budget.
    #[error("no final answer after {steps} steps")]
    StepLimit {
        /// Number of model round trips performed.
        steps: u32,
    },
}

/// Limits and sampling options for one run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgentOptions {
    /// Upper bound on model round trips.
    pub max_steps: u32,
    /// Sampling temperature; `None` leaves the provider default.
    pub temperature: Option<f32>,
    /// Output token budget; `None` leaves the provider default.
    pub max_tokens: Option<u32>,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            max_steps: 5,
            temperature: None,
            max_tokens: None,
        }
    }
}

/// What the model asked for in one reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Directive {
    /// Run `tool` with `input` as `key=value` tokens.
    Call {
        /// Tool name.
        tool: String,
        /// Raw argument text after the tool name.
        input: String,
    },
    /// Final answer.
    Answer(String),
}

/// Reads the first non-blank line of `reply` as a `CALL` directive, or
/// treats the whole reply as the answer.
#[must_use]
pub fn parse_directive(reply: &str) -> Directive {
    let first = reply.lines().map(str::trim).find(|line| !line.is_empty());
    if let Some(rest) = first.and_then(|line| line.strip_prefix(CALL_PREFIX)) {
        if rest.starts_with(char::is_whitespace) {
            let rest = rest.trim_start();
            let (tool, input) = rest
                .split_once(char::is_whitespace)
                .unwrap_or((rest, ""));
            if !tool.is_empty() {
                return Directive::Call {
                    tool: tool.to_owned(),
                    input: input.trim().to_owned(),
                };
            }
        }
    }
    Directive::Answer(reply.trim().to_owned())
}

/// One tool call made during a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolInvocation {
    /// Tool name.
    pub name: String,
    /// Argument text passed to the tool.
    pub input: String,
    /// Text returned to the model.
    pub output: String,
}

/// Final answer together with the tool calls that led to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentOutcome {
    /// The model's final reply.
    pub answer: String,
    /// Tool calls, in order.
    pub invocations: Vec<ToolInvocation>,
}

/// Drives a [`ModelAdapter`] against the registered task tools.
#[derive(Clone)]
pub struct TaskAgent {
    adapter: Arc<dyn ModelAdapter>,
    tools: Arc<ToolRegistry>,
    options: AgentOptions,
}

impl fmt::Debug for TaskAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let metadata = self.adapter.metadata();
        f.debug_struct("TaskAgent")
            .field("provider", &metadata.provider())
            .field("model", &metadata.model())
            .field("tools", &self.tools)
            .field("options", &self.options)
            .finish()
    }
}

impl TaskAgent {
    /// Creates an agent.
    #[must_use]
    pub fn new(
        adapter: Arc<dyn ModelAdapter>,
        tools: Arc<ToolRegistry>,
        options: AgentOptions,
    ) -> Self {
        Self {
            adapter,
            tools,
            options,
        }
    }

    /// Options in effect.
    #[must_use]
    pub const fn options(&self) -> &AgentOptions {
        &self.options
    }

    /// System prompt listing every tool and the reply protocol.
    #[must_use]
    pub fn system_prompt(&self) -> String {
        let tools: String = self
            .tools
            .list()
            .iter()
            .map(|metadata| {
                format!(
                    "- {}: {}\n",
                    metadata.name(),
                    metadata.description().unwrap_or_default()
                )
            })
            .collect();
        format!(
            "You can run the following tasks as tools. To run one, reply with a single line \
             `CALL <tool> KEY=value ...` and nothing else. Any other reply is taken as your \
             final answer.\n\nTools:\n{tools}"
        )
    }

    /// Human-readable configuration report.
    #[must_use]
    pub fn describe(&self) -> String {
        let metadata = self.adapter.metadata();
        let mut lines = vec![
            "--- Agent Configuration ---".to_owned(),
            format!("Provider: {}", metadata.provider()),
            format!("Model Name (configured in LLM client): {}", metadata.model()),
            "LLM Call Options:".to_owned(),
        ];
        if let Some(temperature) = self.options.temperature {
            lines.push(format!("  Temperature: {temperature}"));
        }
        if let Some(max_tokens) = self.options.max_tokens {
            lines.push(format!("  Max Tokens: {max_tokens}"));
        }
        if self.options.temperature.is_none() && self.options.max_tokens.is_none() {
            lines.push("  (provider defaults)".to_owned());
        }
        lines.push(format!("Max Steps: {}", self.options.max_steps));
        lines.push(String::new());
        lines.push("Tools:".to_owned());
        for (index, tool) in self.tools.list().iter().enumerate() {
            lines.push(format!("  Tool {}:", index + 1));
            lines.push(format!("    Name: {}", tool.name()));
            lines.push(format!(
                "    Description & Usage: {}",
                tool.description().unwrap_or_default()
            ));
        }
        lines.push("--- End of Agent Configuration ---".to_owned());
        lines.join("\n")
    }

    /// Runs the loop for `prompt` until the model answers.
    ///
    /// Tool errors, including unknown tool names, are reported back to the
    /// model rather than ending the run.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Adapter`] if inference fails and
    /// [`AgentError::StepLimit`] when `max_steps` replies were all tool
    /// calls.
    #[instrument(skip(self, prompt), fields(provider = self.adapter.metadata().provider()))]
    pub async fn run(&self, prompt: &str) -> AgentResult<AgentOutcome> {
        let system_prompt = self.system_prompt();
        let mut messages = vec![PromptMessage::user(prompt)];
        let mut invocations = Vec::new();

        for step in 1..=self.options.max_steps {
            let reply = self.infer(&system_prompt, messages.clone()).await?;
            debug!(step, reply = %reply, "model replied");

            match parse_directive(&reply) {
                Directive::Answer(answer) => {
                    info!(step, tool_calls = invocations.len(), "agent finished");
                    return Ok(AgentOutcome {
                        answer,
                        invocations,
                    });
                }
                Directive::Call { tool, input } => {
                    let output = self.call_tool(&tool, &input).await;
                    messages.push(PromptMessage::assistant(reply));
                    messages.push(PromptMessage::task_output(output.clone()));
                    invocations.push(ToolInvocation {
                        name: tool,
                        input,
                        output,
                    });
                }
            }
        }

        warn!(steps = self.options.max_steps, "step budget exhausted");
        Err(AgentError::StepLimit {
            steps: self.options.max_steps,
        })
    }

    async fn infer(
        &self,
        system_prompt: &str,
        messages: Vec<PromptMessage>,
    ) -> AgentResult<String> {
        let metadata = self.adapter.metadata();
        let map_err = |source| AgentError::Adapter {
            provider: metadata.provider(),
            model: metadata.model().to_owned(),
            source,
        };

        let mut request = InferenceRequest::new(messages)
            .map_err(map_err)?
            .with_system_prompt(system_prompt);
        if let Some(temperature) = self.options.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.options.max_tokens {
            request = request.with_max_output_tokens(max_tokens);
        }

        let stream = self.adapter.infer(request).await.map_err(map_err)?;
        collect_text(stream).await.map_err(map_err)
    }

    async fn call_tool(&self, tool: &str, input: &str) -> String {
        info!(tool, "agent invoking tool");
        match self.tools.invoke(tool, Value::String(input.to_owned())).await {
            Ok(Value::String(text)) => text,
            Ok(other) => other.to_string(),
            Err(err) => {
                warn!(tool, error = %err, "tool call rejected");
                format!("Error: {err}")
            }
        }
    }
}
