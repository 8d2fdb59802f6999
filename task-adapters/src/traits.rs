//! Provider-neutral request and response types.

use std::borrow::Cow;
use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use thiserror::Error;

/// Marker line placed ahead of task output when a provider has no
/// dedicated tool-result turn.
pub const TASK_OUTPUT_TAG: &str = "[Task Output]";

/// Result alias for adapter calls.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Text deltas produced by [`ModelAdapter::infer`].
pub type AdapterStream = Pin<Box<dyn Stream<Item = AdapterResult<InferenceChunk>> + Send>>;

/// Failures reported by model adapters.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Settings are unusable, e.g. a missing API key or a bad base URL.
    #[error("LLM client misconfigured: {reason}")]
    Configuration {
        /// What is wrong.
        reason: String,
    },

    /// The request cannot be sent as built.
    #[error("invalid LLM request: {reason}")]
    InvalidRequest {
        /// What is wrong.
        reason: String,
    },

    /// The HTTP exchange failed or timed out.
    #[error("LLM transport failed: {reason}")]
    Transport {
        /// Underlying failure.
        reason: String,
    },

    /// The provider answered with an error status or an unreadable body.
    #[error("LLM provider returned an error: {reason}")]
    Response {
        /// Status and body excerpt, or the decode error.
        reason: String,
    },
}

impl AdapterError {
    /// Builds [`AdapterError::InvalidRequest`].
    #[must_use]
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Builds [`AdapterError::Configuration`].
    #[must_use]
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Builds [`AdapterError::Transport`].
    #[must_use]
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Builds [`AdapterError::Response`].
    #[must_use]
    pub fn response(reason: impl Into<String>) -> Self {
        Self::Response {
            reason: reason.into(),
        }
    }
}

/// Provider and model an adapter instance talks to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdapterMetadata {
    provider: &'static str,
    model: String,
}

impl AdapterMetadata {
    /// Pairs a provider name with a model identifier.
    #[must_use]
    pub fn new(provider: &'static str, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Provider name as registered, e.g. `anthropic`.
    #[must_use]
    pub const fn provider(&self) -> &'static str {
        self.provider
    }

    /// Model identifier sent with each request.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Author of a conversation turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageRole {
    /// Instructions.
    System,
    /// The person asking.
    User,
    /// A previous model reply.
    Assistant,
    /// Output of a task the model asked to run.
    Tool,
}

impl MessageRole {
    /// Role name in chat-completion APIs. Task output travels as a user
    /// turn because those APIs only accept `tool` turns that answer a
    /// native tool call.
    #[must_use]
    pub const fn chat_role(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User | Self::Tool => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        })
    }
}

/// One conversation turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptMessage {
    role: MessageRole,
    content: String,
}

impl PromptMessage {
    /// Creates a turn with an explicit role.
    #[must_use]
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// A [`MessageRole::User`] turn.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// A [`MessageRole::Assistant`] turn.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// A [`MessageRole::Tool`] turn carrying task output.
    #[must_use]
    pub fn task_output(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Tool, content)
    }

    /// Author of the turn.
    #[must_use]
    pub const fn role(&self) -> MessageRole {
        self.role
    }

    /// Text as supplied.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Text as sent to a provider: task output is prefixed with
    /// [`TASK_OUTPUT_TAG`], everything else is unchanged.
    #[must_use]
    pub fn rendered_content(&self) -> Cow<'_, str> {
        match self.role {
            MessageRole::Tool => Cow::Owned(format!("{TASK_OUTPUT_TAG}\n{}", self.content)),
            _ => Cow::Borrowed(&self.content),
        }
    }
}

/// A conversation plus sampling options.
#[derive(Clone, Debug, PartialEq)]
pub struct InferenceRequest {
    system_prompt: Option<String>,
    messages: Vec<PromptMessage>,
    max_output_tokens: Option<u32>,
    temperature: Option<f32>,
}

impl InferenceRequest {
    /// Starts a request from the conversation so far.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::InvalidRequest`] for an empty conversation.
    pub fn new(messages: Vec<PromptMessage>) -> AdapterResult<Self> {
        if messages.is_empty() {
            return Err(AdapterError::invalid_request("conversation is empty"));
        }

        Ok(Self {
            system_prompt: None,
            messages,
            max_output_tokens: None,
            temperature: None,
        })
    }

    /// Instructions placed ahead of the conversation. Providers carry them
    /// either as a leading system turn or in a dedicated field.
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Caps the reply length. Overrides the adapter default.
    #[must_use]
    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }

    /// Sets the sampling temperature. Overrides the adapter default.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Instructions, if any.
    #[must_use]
    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    /// Conversation turns, oldest first.
    #[must_use]
    pub fn messages(&self) -> &[PromptMessage] {
        &self.messages
    }

    /// Reply length cap, if set on the request.
    #[must_use]
    pub const fn max_output_tokens(&self) -> Option<u32> {
        self.max_output_tokens
    }

    /// Temperature, if set on the request.
    #[must_use]
    pub const fn temperature(&self) -> Option<f32> {
        self.temperature
    }
}

/// A piece of reply text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InferenceChunk {
    /// Text added by this chunk.
    pub delta: String,
    /// Set on the last chunk of a reply.
    pub done: bool,
}

impl InferenceChunk {
    /// Wraps `delta`.
    #[must_use]
    pub fn new(delta: impl Into<String>, done: bool) -> Self {
        Self {
            delta: delta.into(),
            done,
        }
    }
}

/// A language model client.
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    /// Provider and model this adapter talks to.
    fn metadata(&self) -> &AdapterMetadata;

    /// Sends `request` and streams the reply.
    async fn infer(&self, request: InferenceRequest) -> AdapterResult<AdapterStream>;
}

/// Drains a response stream into one string, stopping at the first chunk
/// marked `done`.
///
/// # Errors
///
/// Propagates the first error yielded by the stream.
pub async fn collect_text(mut stream: AdapterStream) -> AdapterResult<String> {
    let mut text = String::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        text.push_str(&chunk.delta);
        if chunk.done {
            break;
        }
    }
    Ok(text)
}
