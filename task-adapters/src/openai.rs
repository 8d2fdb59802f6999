//! `OpenAI` chat completions adapter.

use std::{env, fmt, time::Duration};

use async_trait::async_trait;
use futures::stream;
use hyper::Uri;
use hyper::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::http_client::{
    HyperClient, JsonCall, build_https_client, endpoint, sanitize_base_url, secret_header,
};
use crate::traits::{
    AdapterError, AdapterMetadata, AdapterResult, AdapterStream, InferenceChunk, InferenceRequest,
    ModelAdapter, PromptMessage,
};

/// Environment variable consulted by [`OpenAiConfig::from_env`].
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

const PROVIDER: &str = "OpenAI";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/";

/// Model, credentials and defaults for [`OpenAiAdapter`].
#[derive(Clone)]
pub struct OpenAiConfig {
    api_key: Option<String>,
    model: String,
    base_url: String,
    timeout: Duration,
    default_temperature: Option<f32>,
    default_max_tokens: Option<u32>,
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("has_api_key", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}

impl OpenAiConfig {
    /// Settings for `model` with no API key.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            api_key: None,
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout: Duration::from_secs(60),
            default_temperature: None,
            default_max_tokens: None,
        }
    }

    /// Settings for `model`, keyed from [`OPENAI_API_KEY_ENV`] when set.
    #[must_use]
    pub fn from_env(model: impl Into<String>) -> Self {
        let mut cfg = Self::new(model);
        cfg.api_key = env::var(OPENAI_API_KEY_ENV).ok().filter(|key| !key.is_empty());
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

    /// Sets the output token budget used when requests omit it.
    #[must_use]
    pub fn with_default_max_tokens(mut self, max_tokens: u32) -> Self {
        self.default_max_tokens = Some(max_tokens);
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

/// `OpenAI` adapter that calls the chat completions API over HTTPS.
pub struct OpenAiAdapter {
    client: HyperClient,
    endpoint: Uri,
    metadata: AdapterMetadata,
    api_key: Option<String>,
    timeout: Duration,
    default_temperature: Option<f32>,
    default_max_tokens: Option<u32>,
}

impl fmt::Debug for OpenAiAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiAdapter")
            .field("model", &self.metadata.model())
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl OpenAiAdapter {
    /// Builds the adapter and its HTTPS client.
    ///
    /// A missing API key is tolerated here and reported on the first
    /// [`infer`](ModelAdapter::infer) call.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] if the endpoint is invalid.
    pub fn new(config: OpenAiConfig) -> AdapterResult<Self> {
        if config.api_key.is_none() {
            warn!("{OPENAI_API_KEY_ENV} is not set; inference calls will fail");
        }

        Ok(Self {
            client: build_https_client(),
            endpoint: endpoint(PROVIDER, &config.base_url, "v1/chat/completions")?,
            metadata: AdapterMetadata::new("openai", config.model),
            api_key: config.api_key,
            timeout: config.timeout,
            default_temperature: config.default_temperature,
            default_max_tokens: config.default_max_tokens,
        })
    }

    fn build_request(&self, request: &InferenceRequest) -> ChatCompletionRequest {
        let system = request
            .system_prompt()
            .map(|prompt| OpenAiMessage {
                role: "system".to_owned(),
                content: prompt.to_owned(),
            });
        let messages = system
            .into_iter()
            .chain(request.messages().iter().map(map_prompt_message))
            .collect();

        ChatCompletionRequest {
            model: self.metadata.model().to_owned(),
            messages,
            temperature: request.temperature().or(self.default_temperature),
            max_tokens: request.max_output_tokens().or(self.default_max_tokens),
            stream: false,
        }
    }
}

#[async_trait]
impl ModelAdapter for OpenAiAdapter {
    fn metadata(&self) -> &AdapterMetadata {
        &self.metadata
    }

    async fn infer(&self, request: InferenceRequest) -> AdapterResult<AdapterStream> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AdapterError::configuration(format!("OpenAI adapter requires {OPENAI_API_KEY_ENV}"))
        })?;
        let authorization = secret_header(PROVIDER, &format!("Bearer {api_key}"))?;

        let response: ChatCompletionResponse = JsonCall {
            provider: PROVIDER,
            client: &self.client,
            endpoint: &self.endpoint,
            headers: vec![(AUTHORIZATION, authorization)],
            timeout: self.timeout,
        }
        .send(&self.build_request(&request))
        .await?;

        let content = response.into_content();
        Ok(Box::pin(stream::once(async move {
            Ok(InferenceChunk::new(content, true))
        })))
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

impl ChatCompletionResponse {
    fn into_content(self) -> String {
        self.choices
            .into_iter()
            .find_map(|choice| choice.message.and_then(|message| message.content))
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn map_prompt_message(message: &PromptMessage) -> OpenAiMessage {
    OpenAiMessage {
        role: message.role().chat_role().to_owned(),
        content: message.rendered_content().into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::MessageRole;

    fn adapter(config: OpenAiConfig) -> OpenAiAdapter {
        OpenAiAdapter::new(config).expect("adapter")
    }

    #[test]
    fn base_url_requires_scheme() {
        let err = OpenAiConfig::new("gpt-4o")
            .with_base_url("api.openai.com")
            .expect_err("missing scheme should error");
        assert!(matches!(err, AdapterError::Configuration { .. }));
    }

    #[test]
    fn system_prompt_becomes_leading_message() {
        let adapter = adapter(OpenAiConfig::new("gpt-4o").with_api_key("test_key"));
        let request = InferenceRequest::new(vec![PromptMessage::new(MessageRole::User, "hello")])
            .unwrap()
            .with_system_prompt("use the tools");

        let chat = adapter.build_request(&request);
        assert_eq!(chat.messages.len(), 2);
        assert_eq!(chat.messages[0].role, "system");
        assert_eq!(chat.messages[0].content, "use the tools");
        assert_eq!(chat.messages[1].role, "user");
    }

    #[test]
    fn task_output_is_sent_as_user_turn() {
        let mapped = map_prompt_message(&PromptMessage::task_output("Sunny"));
        assert_eq!(mapped.role, "user");
        assert_eq!(mapped.content, "[Task Output]\nSunny");
    }

    #[test]
    fn request_values_override_defaults() {
        let adapter = adapter(
            OpenAiConfig::new("gpt-4o")
                .with_default_temperature(0.2)
                .with_default_max_tokens(64),
        );
        let request = InferenceRequest::new(vec![PromptMessage::new(MessageRole::User, "hi")])
            .unwrap()
            .with_max_output_tokens(512);

        let chat = adapter.build_request(&request);
        assert_eq!(chat.model, "gpt-4o");
        assert_eq!(chat.temperature, Some(0.2));
        assert_eq!(chat.max_tokens, Some(512));
    }

    #[test]
    fn response_parsing_extracts_content() {
        let parsed: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"content": null}}, {"message": {"content": "hi"}}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.into_content(), "hi");
    }

    #[tokio::test]
    async fn missing_key_fails_at_inference() {
        let adapter = adapter(OpenAiConfig::new("gpt-4o"));
        let request =
            InferenceRequest::new(vec![PromptMessage::new(MessageRole::User, "hi")]).unwrap();
        let err = adapter.infer(request).await.err().expect("missing key");
        assert!(matches!(err, AdapterError::Configuration { .. }));
        assert!(err.to_string().contains(OPENAI_API_KEY_ENV));
    }
}
