//! LLM Provider Abstraction Layer
//!
//! This module normalizes the function-calling protocols of four vendors
//! (OpenAI, Anthropic, Gemini, and a local Ollama server speaking the
//! OpenAI-compatible API) into one canonical representation.
//!
//! Each vendor is a [`ProviderAdapter`]: a stateless translator that encodes
//! the conversation plus the tool catalog into a vendor request body, and
//! decodes the vendor response into a [`ProviderTurn`]. The outbound HTTP
//! exchange is done by [`client::ProviderClient`], which is the same for
//! every vendor.

use crate::tools::ToolSpec;
use async_trait::async_trait;
use sdk::errors::EngineError;
use sdk::types::{ToolCallRequest, ToolCallResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub mod anthropic;
pub mod client;
pub mod gemini;
pub mod ollama;
pub mod openai;

pub use client::{ProviderClient, RemoteProvider};

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Provider rejected the request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Missing configuration: {0}")]
    MissingConfig(String),
}

impl From<LLMError> for EngineError {
    fn from(err: LLMError) -> Self {
        match err {
            LLMError::ParseError(msg) => EngineError::ProviderProtocol(msg),
            LLMError::MissingConfig(msg) => EngineError::InvalidRequest(msg),
            other => EngineError::ProviderTransport(other.to_string()),
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User message
    User,

    /// Assistant message (the chat front end calls this role "bot")
    #[serde(alias = "bot")]
    Assistant,

    /// System message
    System,

    /// Tool result message
    Tool,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// Message in a conversation history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Role of the message sender
    pub role: MessageRole,

    /// Content of the message
    #[serde(default)]
    pub content: String,

    /// Tool calls requested by an assistant turn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,

    /// Call id a tool result message answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Name of the tool a tool result message came from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl Message {
    fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            tool_name: None,
        }
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create an assistant message that requested tool calls
    pub fn assistant_tool_calls(content: impl Into<String>, calls: Vec<ToolCallRequest>) -> Self {
        Self {
            tool_calls: calls,
            ..Self::new(MessageRole::Assistant, content)
        }
    }

    /// Create a tool result message answering one call
    pub fn tool_result(result: &ToolCallResult) -> Self {
        Self {
            tool_call_id: Some(result.call_id.clone()),
            tool_name: Some(result.tool_name.clone()),
            ..Self::new(MessageRole::Tool, result.to_content_string())
        }
    }
}

/// Closed set of supported vendors
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAI,
    Anthropic,
    Gemini,
    Ollama,
}

impl ProviderKind {
    /// Parse an explicit provider name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "openai" => Some(Self::OpenAI),
            "anthropic" | "claude" => Some(Self::Anthropic),
            "gemini" | "google" => Some(Self::Gemini),
            "ollama" | "local" => Some(Self::Ollama),
            _ => None,
        }
    }

    /// Infer the provider from a model id prefix
    pub fn infer(model: &str) -> Option<Self> {
        let model = model.trim();
        if model.starts_with("gpt-")
            || model.starts_with("o1")
            || model.starts_with("o3")
            || model.starts_with("o4")
        {
            Some(Self::OpenAI)
        } else if model.starts_with("claude-") {
            Some(Self::Anthropic)
        } else if model.starts_with("gemini-") {
            Some(Self::Gemini)
        } else if model.starts_with("ollama-") || model == "ollama" {
            Some(Self::Ollama)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::Ollama => "ollama",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-request provider selection and credentials
#[derive(Clone, PartialEq)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub model: String,
    pub api_key: Option<String>,
    pub server_url: Option<String>,
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind, model: impl Into<String>) -> Self {
        Self {
            kind,
            model: model.into(),
            api_key: None,
            server_url: None,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into()).filter(|k: &String| !k.is_empty());
        self
    }

    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into()).filter(|u: &String| !u.is_empty());
        self
    }

    /// The API key, or `MissingConfig` when the vendor needs one
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| LLMError::MissingConfig(format!("an API key is required for {}", self.kind)))
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("server_url", &self.server_url)
            .finish()
    }
}

/// Decoded result of one provider round trip
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderTurn {
    /// The model answered without requesting tools
    FinalAnswer(String),

    /// The model requested one or more tool calls
    ToolCalls {
        text: Option<String>,
        calls: Vec<ToolCallRequest>,
    },
}

/// Translator between the canonical conversation and one vendor's wire format
pub trait ProviderAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Full request URL. May embed the key for vendors that pass it as a query parameter.
    fn endpoint(&self, config: &ProviderConfig) -> Result<String>;

    /// Request headers beyond `Content-Type`
    fn headers(&self, config: &ProviderConfig) -> Result<Vec<(String, String)>>;

    /// Build the vendor request body
    fn encode_request(&self, messages: &[Message], specs: &[ToolSpec], config: &ProviderConfig) -> Result<Value>;

    /// Parse the vendor response body
    fn decode_response(&self, body: Value) -> Result<ProviderTurn>;
}

/// Something that can answer a conversation turn
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Returns the name of the provider (e.g., "openai", "ollama")
    fn name(&self) -> &str;

    /// Send the conversation and the tool catalog, and decode the answer
    async fn complete(&self, messages: &[Message], specs: &[ToolSpec]) -> Result<ProviderTurn>;
}

/// Select the adapter for a vendor
pub fn adapter_for(kind: ProviderKind, config: &crate::config::LLMConfig) -> Box<dyn ProviderAdapter> {
    match kind {
        ProviderKind::OpenAI => Box::new(openai::OpenAIAdapter::new(config.openai.clone())),
        ProviderKind::Anthropic => Box::new(anthropic::AnthropicAdapter::new(config.anthropic.clone())),
        ProviderKind::Gemini => Box::new(gemini::GeminiAdapter::new(config.gemini.clone())),
        ProviderKind::Ollama => Box::new(ollama::OllamaAdapter::new(config.ollama.clone())),
    }
}

/// Identifier for a call the vendor did not name
pub(crate) fn synthesize_call_id() -> String {
    format!("call_{}", uuid::Uuid::new_v4().simple())
}

/// Parse a tool result message body back into JSON for vendors that want structured results
pub(crate) fn content_as_json(content: &str) -> Value {
    serde_json::from_str(content).unwrap_or_else(|_| Value::String(content.to_string()))
}
