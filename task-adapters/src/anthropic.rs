//! Anthropic messages API adapter.

use std::{env, fmt, time::Duration};

use async_trait::async_trait;
use futures::stream;
use hyper::Uri;
use hyper::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::http_client::{
    HyperClient, JsonCall, build_https_client, endpoint, sanitize_base_url, secret_header,
};
use crate::traits::{
    AdapterError, AdapterMetadata, AdapterResult, AdapterStream, InferenceChunk, InferenceRequest,
    MessageRole, ModelAdapter, PromptMessage,
};

/// Environment variable consulted by [`AnthropicConfig::from_env`].
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

const PROVIDER: &str = "Anthropic";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Model, credentials and defaults for [`AnthropicAdapter`].
#[derive(Clone)]
pub struct AnthropicConfig {
    api_key: Option<String>,
    model: String,
    base_url: String,
    timeout: Duration,
    default_temperature: Option<f32>,
    default_max_tokens: u32,
}

impl fmt::Debug for AnthropicConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("has_api_key", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}

impl AnthropicConfig {
    /// Settings for `model` with no API key.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            api_key: None,
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout: Duration::from_secs(60),
            default_temperature: None,
            default_max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Settings for `model`, keyed from [`ANTHROPIC_API_KEY_ENV`] when set.
    #[must_use]
    pub fn from_env(model: impl Into<String>) -> Self {
        let mut cfg = Self::new(model);
        cfg.api_key = env::var(ANTHROPIC_API_KEY_ENV)
            .ok()
            .filter(|key| !key.is_empty());
        cfg
    }

    /// Points the adapter at another host, e.g. a proxy.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] when the URL lacks an
    /// `http(s)://` scheme or does not parse.
    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> AdapterResult<Self> {
        self.base_url = sanitize_base_url(PROVIDER, base_url.as_ref())?;
        Ok(self)
    }

    /// Sets the sampling temperature used when requests omit it.
    #[must_use]
    pub fn with_default_temperature(mut self, temperature: f32) -> Self {
        self.default_temperature = Some(temperature);
        self
    }

    /// Sets the output token budget used when requests omit it. The
    /// messages API requires one on every call.
    #[must_use]
    pub fn with_default_max_tokens(mut self, max_tokens: u32) -> Self {
        self.default_max_tokens = max_tokens;
        self
    }

    /// Bounds each HTTP exchange.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Uses `key` instead of the environment.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

/// Anthropic adapter that calls the messages API over HTTPS.
pub struct AnthropicAdapter {
    client: HyperClient,
    endpoint: Uri,
    metadata: AdapterMetadata,
    api_key: Option<String>,
    timeout: Duration,
    default_temperature: Option<f32>,
    default_max_tokens: u32,
}

impl fmt::Debug for AnthropicAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicAdapter")
            .field("model", &self.metadata.model())
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl AnthropicAdapter {
    /// Builds the adapter and its HTTPS client.
    ///
    /// A missing API key is tolerated here and reported on the first
    /// [`infer`](ModelAdapter::infer) call.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] if the endpoint is invalid.
    pub fn new(config: AnthropicConfig) -> AdapterResult<Self> {
        if config.api_key.is_none() {
            warn!("{ANTHROPIC_API_KEY_ENV} is not set; inference calls will fail");
        }

        Ok(Self {
            client: build_https_client(),
            endpoint: endpoint(PROVIDER, &config.base_url, "v1/messages")?,
            metadata: AdapterMetadata::new("anthropic", config.model),
            api_key: config.api_key,
            timeout: config.timeout,
            default_temperature: config.default_temperature,
            default_max_tokens: config.default_max_tokens,
        })
    }

    fn build_request(&self, request: &InferenceRequest) -> MessagesRequest {
        // The API takes the system prompt as a field, never as a message.
        let messages = request
            .messages()
            .iter()
            .filter(|message| message.role() != MessageRole::System)
            .map(map_prompt_message)
            .collect();

        MessagesRequest {
            model: self.metadata.model().to_owned(),
            system: request.system_prompt().map(ToOwned::to_owned),
            messages,
            max_tokens: request
                .max_output_tokens()
                .unwrap_or(self.default_max_tokens),
            temperature: request.temperature().or(self.default_temperature),
            stream: false,
        }
    }
}

#[async_trait]
impl ModelAdapter for AnthropicAdapter {
    fn metadata(&self) -> &AdapterMetadata {
        &self.metadata
    }

    async fn infer(&self, request: InferenceRequest) -> AdapterResult<AdapterStream> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AdapterError::configuration(format!(
                "Anthropic adapter requires {ANTHROPIC_API_KEY_ENV}"
            ))
        })?;

        let response: MessagesResponse = JsonCall {
            provider: PROVIDER,
            client: &self.client,
            endpoint: &self.endpoint,
            headers: vec![
                (
                    HeaderName::from_static("x-api-key"),
                    secret_header(PROVIDER, api_key)?,
                ),
                (
                    HeaderName::from_static("anthropic-version"),
                    HeaderValue::from_static(ANTHROPIC_VERSION),
                ),
            ],
            timeout: self.timeout,
        }
        .send(&self.build_request(&request))
        .await?;

        let content = response.into_text();
        Ok(Box::pin(stream::once(async move {
            Ok(InferenceChunk::new(content, true))
        })))
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

impl MessagesResponse {
    fn into_text(self) -> String {
        self.content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

fn map_prompt_message(message: &PromptMessage) -> AnthropicMessage {
    match message.role() {
        MessageRole::Assistant => AnthropicMessage {
            role: "assistant",
            content: message.content().to_owned(),
        },
        MessageRole::User | MessageRole::System | MessageRole::Tool => AnthropicMessage {
            role: "user",
            content: message.rendered_content().into_owned(),
        },
    }
}
