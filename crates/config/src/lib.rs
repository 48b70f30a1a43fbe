//! Configuration loading and validation for taskloom.
//!
//! Loads `taskloom.toml` from the working directory (or the path in
//! `TASKLOOM_CONFIG`), applies environment overrides, and validates all
//! settings before the agent is built.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("Failed to parse config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// The root configuration structure. Maps directly to `taskloom.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// The backbone LLM
    #[serde(default)]
    pub llm: LlmConfig,

    /// Agent behavior settings
    #[serde(default)]
    pub agent: AgentSettings,

    /// MCP servers to discover tools from
    #[serde(default)]
    pub mcp_servers: Vec<McpServerConfig>,
}

/// Which LLM endpoint to talk to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Backend label (e.g. "openai", "openrouter", "ollama")
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key; `TASKLOOM_API_KEY` overrides this
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            base_url: default_base_url(),
            api_key: None,
            model: default_model(),
        }
    }
}

fn default_backend() -> String {
    "ollama".into()
}
fn default_base_url() -> String {
    "http://localhost:11434/v1".into()
}
fn default_model() -> String {
    "llama3.2".into()
}

/// Agent behavior settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Print the rollout trace after each task
    #[serde(default)]
    pub show_rollout: bool,
}

/// One MCP server entry.
///
/// Exactly one connection mode should be set: `command` (stdio) or
/// `url` (streamable HTTP). When both are set, stdio wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Provider identity, used to namespace its tools
    pub name: String,

    /// Subprocess command for a stdio server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Subprocess arguments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Extra environment for the subprocess
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,

    /// Endpoint URL for a streamable HTTP server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Headers for every HTTP request
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

impl AppConfig {
    /// Load configuration.
    ///
    /// Resolution order: explicit `path` argument, then the
    /// `TASKLOOM_CONFIG` environment variable, then `./taskloom.toml`.
    /// A missing file yields the defaults. `TASKLOOM_API_KEY` overrides
    /// the configured API key.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(|| {
            std::env::var("TASKLOOM_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("taskloom.toml"))
        });

        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            toml::from_str(&raw).map_err(|e| ConfigError::Parse {
                path: path.clone(),
                reason: e.to_string(),
            })?
        } else {
            debug!(path = %path.display(), "No config file found, using defaults");
            Self::default()
        };

        config.apply_overrides(std::env::var("TASKLOOM_API_KEY").ok());
        Ok(config)
    }

    /// Apply environment-derived overrides.
    pub fn apply_overrides(&mut self, api_key: Option<String>) {
        if let Some(key) = api_key {
            self.llm.api_key = Some(key);
        }
    }

    /// Validate all settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Invalid("llm.model must not be empty".into()));
        }
        if !self.llm.base_url.starts_with("http://") && !self.llm.base_url.starts_with("https://")
        {
            return Err(ConfigError::Invalid(format!(
                "llm.base_url must be an http(s) URL, got '{}'",
                self.llm.base_url
            )));
        }

        for server in &self.mcp_servers {
            if server.name.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "every mcp_servers entry needs a name".into(),
                ));
            }
            if server.command.is_none() && server.url.is_none() {
                return Err(ConfigError::Invalid(format!(
                    "mcp server '{}' needs either a command (stdio) or a url (streamable HTTP)",
                    server.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.llm.backend, "ollama");
        assert!(config.mcp_servers.is_empty());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.llm.base_url, config.llm.base_url);
        assert_eq!(parsed.llm.model, config.llm.model);
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load(Some(Path::new("/nonexistent/taskloom.toml"))).unwrap();
        assert_eq!(config.llm.model, default_model());
    }

    #[test]
    fn config_file_is_parsed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
                [llm]
                backend = "openrouter"
                base_url = "https://openrouter.ai/api/v1"
                model = "anthropic/claude-sonnet-4"

                [[mcp_servers]]
                name = "files"
                command = "mcp-files"
                args = ["--root", "/tmp"]
            "#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.llm.backend, "openrouter");
        assert_eq!(config.mcp_servers.len(), 1);
        assert_eq!(config.mcp_servers[0].args, vec!["--root", "/tmp"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn api_key_override_wins() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("from-file".into());
        config.apply_overrides(Some("from-env".into()));
        assert_eq!(config.llm.api_key.as_deref(), Some("from-env"));

        config.apply_overrides(None);
        assert_eq!(config.llm.api_key.as_deref(), Some("from-env"));
    }

    #[test]
    fn mcp_server_without_connection_mode_rejected() {
        let config = AppConfig {
            mcp_servers: vec![McpServerConfig {
                name: "broken".into(),
                command: None,
                args: vec![],
                env: HashMap::new(),
                url: None,
                headers: HashMap::new(),
            }],
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_http_base_url_rejected() {
        let config = AppConfig {
            llm: LlmConfig {
                base_url: "localhost:11434".into(),
                ..LlmConfig::default()
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
