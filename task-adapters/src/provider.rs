//! Name-keyed construction of model adapters.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::anthropic::{AnthropicAdapter, AnthropicConfig};
use crate::openai::{OpenAiAdapter, OpenAiConfig};
use crate::traits::{AdapterError, AdapterResult, ModelAdapter};

/// Constructor registered for one provider name.
pub type AdapterFactory = fn(&ProviderSettings) -> AdapterResult<Arc<dyn ModelAdapter>>;

/// Provider-neutral settings handed to an [`AdapterFactory`].
#[derive(Clone, PartialEq)]
pub struct ProviderSettings {
    model: String,
    api_key: Option<String>,
    base_url: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    timeout: Option<Duration>,
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("model", &self.model)
            .field("has_api_key", &self.api_key.is_some())
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ProviderSettings {
    /// Settings for `model`; the API key is read from the provider's
    /// environment variable unless one is supplied.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: None,
            base_url: None,
            temperature: None,
            max_tokens: None,
            timeout: None,
        }
    }

    /// Supplies an explicit API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Overrides the provider base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the sampling temperature. Zero or less leaves the provider
    /// default in place.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = (temperature > 0.0).then_some(temperature);
        self
    }

    /// Sets the output token budget. Zero leaves the provider default in
    /// place.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = (max_tokens > 0).then_some(max_tokens);
        self
    }

    /// Sets the HTTP request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Model identifier.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sampling temperature, when one is set.
    #[must_use]
    pub const fn temperature(&self) -> Option<f32> {
        self.temperature
    }

    /// Output token budget, when one is set.
    #[must_use]
    pub const fn max_tokens(&self) -> Option<u32> {
        self.max_tokens
    }
}

/// Maps provider names to adapter constructors.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<String, AdapterFactory>,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

impl ProviderRegistry {
    /// Creates a registry with no providers.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in `openai` and `anthropic`
    /// providers.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("openai", build_openai);
        registry.register("anthropic", build_anthropic);
        registry
    }

    /// Registers or replaces the constructor for `name`.
    pub fn register(&mut self, name: impl Into<String>, factory: AdapterFactory) {
        self.factories.insert(name.into().to_ascii_lowercase(), factory);
    }

    /// Registered provider names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Builds the adapter for `provider`. Names are case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] for an unknown provider, or
    /// whatever the provider's constructor reports.
    pub fn build(
        &self,
        provider: &str,
        settings: &ProviderSettings,
    ) -> AdapterResult<Arc<dyn ModelAdapter>> {
        let key = provider.trim().to_ascii_lowercase();
        let factory = self.factories.get(&key).ok_or_else(|| {
            AdapterError::configuration(format!(
                "unsupported LLM provider `{provider}` (available: {})",
                self.names().join(", ")
            ))
        })?;
        let adapter = factory(settings)?;
        info!(provider = %key, model = settings.model(), "LLM client initialized");
        Ok(adapter)
    }
}

fn build_openai(settings: &ProviderSettings) -> AdapterResult<Arc<dyn ModelAdapter>> {
    let mut config = OpenAiConfig::from_env(settings.model.clone());
    if let Some(key) = &settings.api_key {
        config = config.with_api_key(key.clone());
    }
    if let Some(base_url) = &settings.base_url {
        config = config.with_base_url(base_url)?;
    }
    if let Some(temperature) = settings.temperature {
        config = config.with_default_temperature(temperature);
    }
    if let Some(max_tokens) = settings.max_tokens {
        config = config.with_default_max_tokens(max_tokens);
    }
    if let Some(timeout) = settings.timeout {
        config = config.with_timeout(timeout);
    }
    Ok(Arc::new(OpenAiAdapter::new(config)?))
}

fn build_anthropic(settings: &ProviderSettings) -> AdapterResult<Arc<dyn ModelAdapter>> {
    let mut config = AnthropicConfig::from_env(settings.model.clone());
    if let Some(key) = &settings.api_key {
        config = config.with_api_key(key.clone());
    }
    if let Some(base_url) = &settings.base_url {
        config = config.with_base_url(base_url)?;
    }
    if let Some(temperature) = settings.temperature {
        config = config.with_default_temperature(temperature);
    }
    if let Some(max_tokens) = settings.max_tokens {
        config = config.with_default_max_tokens(max_tokens);
    }
    if let Some(timeout) = settings.timeout {
        config = config.with_timeout(timeout);
    }
    Ok(Arc::new(AnthropicAdapter::new(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_providers_are_registered() {
        let registry = ProviderRegistry::with_builtin();
        assert_eq!(registry.names(), vec!["anthropic", "openai"]);
    }

    #[test]
    fn builds_known_providers() {
        let registry = ProviderRegistry::with_builtin();
        let settings = ProviderSettings::new("claude-3-sonnet-20240229")
            .with_api_key("test")
            .with_temperature(0.7)
            .with_max_tokens(256);

        let adapter = registry.build("Anthropic", &settings).unwrap();
        assert_eq!(adapter.metadata().provider(), "anthropic");
        assert_eq!(adapter.metadata().model(), "claude-3-sonnet-20240229");

        let adapter = registry
            .build("openai", &ProviderSettings::new("gpt-4o").with_api_key("test"))
            .unwrap();
        assert_eq!(adapter.metadata().provider(), "openai");
    }

    #[test]
    fn unknown_provider_is_a_configuration_error() {
        let err = ProviderRegistry::with_builtin()
            .build("gemini", &ProviderSettings::new("gemini-pro"))
            .err()
            .expect("unknown provider");
        assert!(matches!(err, AdapterError::Configuration { .. }));
        assert!(err.to_string().contains("gemini"));
    }

    #[test]
    fn invalid_base_url_propagates() {
        let settings = ProviderSettings::new("gpt-4o").with_base_url("localhost:8080");
        let err = ProviderRegistry::with_builtin()
            .build("openai", &settings)
            .err()
            .expect("bad base url");
        assert!(matches!(err, AdapterError::Configuration { .. }));
    }

    #[test]
    fn non_positive_options_are_unset() {
        let settings = ProviderSettings::new("m")
            .with_temperature(0.0)
            .with_max_tokens(0);
        assert_eq!(settings.temperature(), None);
        assert_eq!(settings.max_tokens(), None);
    }

    #[test]
    fn custom_factories_can_be_registered() {
        fn failing(_: &ProviderSettings) -> AdapterResult<Arc<dyn ModelAdapter>> {
            Err(AdapterError::configuration("offline"))
        }
        let mut registry = ProviderRegistry::empty();
        registry.register("Local", failing);
        assert_eq!(registry.names(), vec!["local"]);
        let err = registry
            .build("local", &ProviderSettings::new("m"))
            .err()
            .expect("factory error");
        assert!(err.to_string().contains("offline"));
    }
}
