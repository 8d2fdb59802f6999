//! Configuration for the task bridge.
//!
//! Settings live in a TOML file, by default `<config dir>/tmcp/config.toml`.
//! Every field has a default, so a missing file or an empty one yields a
//! working configuration:
//!
//! ```toml
//! [runner]
//! binary = "task"
//! list_format = "json"
//! timeout_secs = 30
//!
//! [server]
//! name = "tasks"
//! version = "1.0.0"
//! honor_required_flags = false
//!
//! [agent]
//! provider = "anthropic"
//! model = "claude-3-sonnet-20240229"
//! temperature = 0.7
//! max_tokens = 256
//! max_steps = 5
//! # base_url = "http://localhost:11434/v1"
//! # timeout_secs = 60
//! ```

#![warn(missing_docs, clippy::pedantic)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use task_inspector::{DEFAULT_RUNNER_BINARY, ListFormat};
use thiserror::Error;
use tracing::debug;

/// File name looked up inside the configuration directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors produced while locating, reading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No per-user configuration directory could be determined.
    #[error("could not determine the configuration directory")]
    NoConfigDir,

    /// The configuration file could not be read.
    #[error("failed to read config from {}: {source}", .path.display())]
    Read {
        /// File that could not be read.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for this schema.
    #[error("failed to parse config from {}: {source}", .path.display())]
    Parse {
        /// File that could not be parsed.
        path: PathBuf,
        /// Decoder error.
        #[source]
        source: toml::de::Error,
    },

    /// A value is outside its permitted range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Human-readable reason for rejection.
        reason: String,
    },
}

impl ConfigError {
    /// Convenience constructor for validation failures.
    #[must_use]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }
}

/// How the external task runner is invoked.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Runner executable, resolved through `PATH` when not absolute.
    pub binary: String,
    /// Listing format used for discovery.
    pub list_format: ListFormat,
    /// Upper bound for one runner invocation, in seconds.
    pub timeout_secs: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            binary: DEFAULT_RUNNER_BINARY.to_owned(),
            list_format: ListFormat::default(),
            timeout_secs: 30,
        }
    }
}

impl RunnerConfig {
    /// The timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Identity and behaviour of the protocol server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server name reported to clients.
    pub name: String,
    /// Server version reported to clients.
    pub version: String,
    /// Publish the `required` flags parsed from task summaries instead of
    /// marking every parameter required.
    pub honor_required_flags: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "tasks".to_owned(),
            version: "1.0.0".to_owned(),
            honor_required_flags: false,
        }
    }
}

/// Language model settings for the agent command.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Provider name, resolved by the provider registry.
    pub provider: String,
    /// Model identifier passed to the provider.
    pub model: String,
    /// Sampling temperature; zero leaves the provider default.
    pub temperature: f32,
    /// Output token budget; zero leaves the provider default.
    pub max_tokens: u32,
    /// Upper bound on model round trips per prompt.
    pub max_steps: u32,
    /// Provider endpoint override, e.g. a local OpenAI-compatible server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// HTTP timeout for one model request, in seconds; unset keeps the
    /// adapter default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_owned(),
            model: "claude-3-sonnet-20240229".to_owned(),
            temperature: 0.7,
            max_tokens: 256,
            max_steps: 5,
            base_url: None,
            timeout_secs: None,
        }
    }
}

impl AgentConfig {
    /// The request timeout as a [`Duration`], when one is set.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Complete bridge configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Runner invocation settings.
    pub runner: RunnerConfig,
    /// Protocol server settings.
    pub server: ServerConfig,
    /// Agent settings.
    pub agent: AgentConfig,
}

impl BridgeConfig {
    /// Loads configuration from `path`, or from the default location when
    /// `path` is `None`.
    ///
    /// An explicit path must exist. A missing default file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or the
    /// default location cannot be determined.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        if let Some(path) = path {
            return Self::load_from(path);
        }

        let path = Self::config_path()?;
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Loads configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Default configuration file path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoConfigDir`] when no home directory is known.
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("", "", "tmcp").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.runner.binary.trim().is_empty() {
            return Err(ConfigError::invalid("runner.binary must not be empty"));
        }
        if self.runner.timeout_secs == 0 {
            return Err(ConfigError::invalid("runner.timeout_secs must be positive"));
        }
        if !(0.0..=2.0).contains(&self.agent.temperature) {
            return Err(ConfigError::invalid(format!(
                "agent.temperature must be within 0.0..=2.0, got {}",
                self.agent.temperature
            )));
        }
        if self.agent.max_steps == 0 {
            return Err(ConfigError::invalid("agent.max_steps must be positive"));
        }
        if self.agent.timeout_secs == Some(0) {
            return Err(ConfigError::invalid("agent.timeout_secs must be positive"));
        }
        if self
            .agent
            .base_url
            .as_deref()
            .is_some_and(|url| url.trim().is_empty())
        {
            return Err(ConfigError::invalid("agent.base_url must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.runner.binary, "task");
        assert_eq!(config.runner.list_format, ListFormat::Json);
        assert_eq!(config.runner.timeout(), Duration::from_secs(30));
        assert_eq!(config.server.name, "tasks");
        assert_eq!(config.server.version, "1.0.0");
        assert!(!config.server.honor_required_flags);
        assert_eq!(config.agent.provider, "anthropic");
        assert_eq!(config.agent.model, "claude-3-sonnet-20240229");
        assert_eq!(config.agent.max_tokens, 256);
        assert_eq!(config.agent.max_steps, 5);
        config.validate().unwrap();
    }

    #[test]
    fn parses_partial_file() {
        let config: BridgeConfig = toml::from_str(
            r#"
[runner]
list_format = "text"
timeout_secs = 5

[agent]
provider = "openai"
model = "gpt-4o"
"#,
        )
        .unwrap();
        assert_eq!(config.runner.binary, "task");
        assert_eq!(config.runner.list_format, ListFormat::Text);
        assert_eq!(config.runner.timeout_secs, 5);
        assert_eq!(config.server, ServerConfig::default());
        assert_eq!(config.agent.provider, "openai");
        assert_eq!(config.agent.max_steps, 5);
        assert_eq!(config.agent.base_url, None);
        assert_eq!(config.agent.timeout(), None);
    }

    #[test]
    fn parses_agent_endpoint() {
        let config: BridgeConfig = toml::from_str(
            r#"
[agent]
provider = "openai"
base_url = "http://localhost:11434/v1"
timeout_secs = 90
"#,
        )
        .unwrap();
        assert_eq!(config.agent.base_url.as_deref(), Some("http://localhost:11434/v1"));
        assert_eq!(config.agent.timeout(), Some(Duration::from_secs(90)));
        config.validate().unwrap();
    }

    #[test]
    fn empty_file_is_default() {
        let config: BridgeConfig = toml::from_str("").unwrap();
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn loads_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nname = \"build-tools\"\nhonor_required_flags = true").unwrap();

        let config = BridgeConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.server.name, "build-tools");
        assert!(config.server.honor_required_flags);
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = BridgeConfig::load(Some(&dir.path().join("absent.toml")))
            .expect_err("missing file should fail");
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn malformed_file_names_the_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[runner]\nlist_format = \"yaml\"").unwrap();

        let err = BridgeConfig::load_from(file.path()).expect_err("bad value should fail");
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        let mut config = BridgeConfig::default();
        config.runner.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::default();
        config.runner.binary = "  ".into();
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::default();
        config.agent.temperature = 2.5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));

        let mut config = BridgeConfig::default();
        config.agent.max_steps = 0;
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::default();
        config.agent.timeout_secs = Some(0);
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::default();
        config.agent.base_url = Some(" ".into());
        assert!(config.validate().is_err());
    }
}
