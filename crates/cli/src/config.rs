//! Configuration loading from vane.toml.

use mcp::ProviderConfig;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration, read once at startup and immutable afterwards.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Inference backend configuration.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Tool-provider launch configuration.
    #[serde(default)]
    pub provider: ProviderSection,
}

/// Backend settings.
#[derive(Debug, Deserialize)]
pub struct BackendConfig {
    /// Inference endpoint base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model to drive.
    #[serde(default = "default_model")]
    pub model: String,

    /// Inference request timeout in seconds.
    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_backend_timeout(),
        }
    }
}

/// Tool-provider launch settings.
#[derive(Debug, Deserialize)]
pub struct ProviderSection {
    /// Command to launch the provider process.
    #[serde(default = "default_provider_command")]
    pub command: String,

    /// Arguments for the command.
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory for the provider process.
    #[serde(default)]
    pub cwd: Option<PathBuf>,

    /// Environment passed to the provider process (e.g. the weather API key).
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Per-call timeout in seconds.
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            command: default_provider_command(),
            args: Vec::new(),
            cwd: None,
            env: HashMap::new(),
            timeout_secs: default_provider_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "qwen2.5:7b".to_string()
}

fn default_backend_timeout() -> u64 {
    120
}

fn default_provider_command() -> String {
    "vane-weather".to_string()
}

fn default_provider_timeout() -> u64 {
    15
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        let mut config: Config =
            toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Default configuration with environment overrides applied.
    pub fn default_config() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(base_url) = std::env::var("VANE_BASE_URL") {
            self.backend.base_url = base_url;
        }
        if let Ok(model) = std::env::var("VANE_MODEL") {
            self.backend.model = model;
        }
    }

    /// Backend request timeout.
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.timeout_secs)
    }

    /// Build the tool-provider launch configuration.
    pub fn provider_config(&self) -> ProviderConfig {
        let mut config = ProviderConfig::new("weather", &self.provider.command)
            .args(self.provider.args.iter().cloned())
            .env(self.provider.env.clone())
            .timeout(Duration::from_secs(self.provider.timeout_secs));
        if let Some(cwd) = &self.provider.cwd {
            config = config.cwd(cwd.clone());
        }
        config
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),
}
