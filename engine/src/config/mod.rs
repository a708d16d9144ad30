//! Configuration management
//!
//! This module handles loading, validation, and management of the RevitMCP
//! bridge configuration. Configuration is stored in TOML format at
//! ~/.revit-mcp/config.toml and is created with defaults on first run.
//!
//! # Configuration Sections
//!
//! - **core**: Log level
//! - **server**: Bind address of the inbound chat endpoint
//! - **listener**: Where and how to find the Revit listener
//! - **orchestrator**: Turn budget and provider timeout
//! - **llm**: Per-vendor base URLs and request settings
//!
//! Provider credentials and model identifiers are never stored here. They
//! arrive with each chat request.
//!
//! # Examples
//!
//! ```no_run
//! use revit_mcp_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//! println!("Listener ports: {:?}", config.listener.candidate_ports);
//! println!("Max turns: {}", config.orchestrator.max_turns);
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Core settings
    #[serde(default)]
    pub core: CoreConfig,

    /// Inbound chat server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Revit listener discovery and call settings
    #[serde(default)]
    pub listener: ListenerConfig,

    /// Conversation loop settings
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// LLM vendor settings
    #[serde(default)]
    pub llm: LLMConfig,
}

/// Core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Inbound chat server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind
    #[serde(default = "default_server_host")]
    pub host: String,

    /// Port to bind
    #[serde(default = "default_server_port")]
    pub port: u16,
}

/// Revit listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// URL scheme of the listener
    #[serde(default = "default_listener_scheme")]
    pub scheme: String,

    /// Host the listener runs on
    #[serde(default = "default_listener_host")]
    pub host: String,

    /// Path prefix of the listener API
    #[serde(default = "default_listener_base_path")]
    pub base_path: String,

    /// Ports probed in order during discovery
    #[serde(default = "default_candidate_ports")]
    pub candidate_ports: Vec<u16>,

    /// Port used when no candidate answers
    #[serde(default = "default_listener_port")]
    pub default_port: u16,

    /// Timeout for a single liveness probe
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    /// Timeout for a tool call against the listener
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Conversation loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum number of provider turns per chat request
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Timeout for a single provider round trip
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,
}

/// LLM vendor configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LLMConfig {
    #[serde(default)]
    pub openai: OpenAIConfig,

    #[serde(default)]
    pub anthropic: AnthropicConfig,

    #[serde(default)]
    pub gemini: GeminiConfig,

    #[serde(default)]
    pub ollama: OllamaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    /// Base URL for the OpenAI API
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    /// Base URL for the Anthropic API
    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,

    /// Value of the anthropic-version header
    #[serde(default = "default_anthropic_api_version")]
    pub api_version: String,

    /// Output token limit per turn
    #[serde(default = "default_anthropic_max_tokens")]
    pub max_tokens: u32,

    /// Friendly model names mapped to dated model ids
    #[serde(default = "default_anthropic_model_aliases")]
    pub model_aliases: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Base URL for the Gemini API
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Server used when the request does not name one
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,

    /// OpenAI-compatible chat completions path
    #[serde(default = "default_ollama_chat_path")]
    pub chat_path: String,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8000
}

fn default_listener_scheme() -> String {
    "http".to_string()
}

fn default_listener_host() -> String {
    "localhost".to_string()
}

fn default_listener_base_path() -> String {
    "/revit-mcp-v1".to_string()
}

fn default_candidate_ports() -> Vec<u16> {
    vec![48884, 48885, 48886]
}

fn default_listener_port() -> u16 {
    48884
}

fn default_probe_timeout_secs() -> u64 {
    2
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_max_turns() -> usize {
    8
}

fn default_provider_timeout_secs() -> u64 {
    120
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com/v1".to_string()
}

fn default_anthropic_api_version() -> String {
    "2023-06-01".to_string()
}

fn default_anthropic_max_tokens() -> u32 {
    3000
}

fn default_anthropic_model_aliases() -> BTreeMap<String, String> {
    [
        ("claude-4-sonnet", "claude-sonnet-4-20250514"),
        ("claude-4-opus", "claude-opus-4-20250514"),
        ("claude-3-7-sonnet", "claude-3-7-sonnet-20250219"),
        ("claude-3-5-sonnet", "claude-3-5-sonnet-20241022"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_chat_path() -> String {
    "/v1/chat/completions".to_string()
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            scheme: default_listener_scheme(),
            host: default_listener_host(),
            base_path: default_listener_base_path(),
            candidate_ports: default_candidate_ports(),
            default_port: default_listener_port(),
            probe_timeout_secs: default_probe_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ListenerConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            provider_timeout_secs: default_provider_timeout_secs(),
        }
    }
}

impl OrchestratorConfig {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
        }
    }
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            base_url: default_anthropic_base_url(),
            api_version: default_anthropic_api_version(),
            max_tokens: default_anthropic_max_tokens(),
            model_aliases: default_anthropic_model_aliases(),
        }
    }
}

impl AnthropicConfig {
    /// Resolve a friendly model name to the id the API expects
    pub fn resolve_model<'a>(&'a self, model: &'a str) -> &'a str {
        self.model_aliases
            .get(model)
            .map(String::as_str)
            .unwrap_or(model)
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: default_gemini_base_url(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            chat_path: default_ollama_chat_path(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.revit-mcp/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or written, the TOML fails
    /// to parse, or validation fails.
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, EngineError> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let config = Self::default();
        config.validate()?;

        let toml_string = config.to_toml_string()?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(config)
    }

    /// Serialize the configuration as pretty TOML
    pub fn to_toml_string(&self) -> Result<String, EngineError> {
        toml::to_string_pretty(self)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Get the default configuration file path (~/.revit-mcp/config.toml)
    fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".revit-mcp").join("config.toml"))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if self.listener.candidate_ports.is_empty() {
            return Err(EngineError::Config(
                "listener.candidate_ports must name at least one port".to_string(),
            ));
        }

        if self.listener.scheme != "http" && self.listener.scheme != "https" {
            return Err(EngineError::Config(format!(
                "listener.scheme must be http or https, got '{}'",
                self.listener.scheme
            )));
        }

        if self.listener.probe_timeout_secs == 0 || self.listener.request_timeout_secs == 0 {
            return Err(EngineError::Config(
                "listener timeouts must be greater than zero".to_string(),
            ));
        }

        if self.orchestrator.max_turns == 0 {
            return Err(EngineError::Config(
                "orchestrator.max_turns must be greater than zero".to_string(),
            ));
        }

        if self.orchestrator.provider_timeout_secs == 0 {
            return Err(EngineError::Config(
                "orchestrator.provider_timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
