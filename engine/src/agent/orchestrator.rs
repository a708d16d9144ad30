//! Conversation Orchestrator
//!
//! Drives the turn loop for one chat request:
//!
//! 1. Prepend the planning system prompt
//! 2. Send the conversation and the tool catalog to the selected provider
//! 3. On a final answer, stop
//! 4. On tool calls, run each one in order and append one result message per call
//! 5. Repeat until the provider answers or the turn budget runs out
//!
//! Unknown tool names end the request. Argument errors go back to the
//! provider as tool results so it can correct itself.

use crate::agent::prompt::planning_prompt;
use crate::conductor::PlanExecutor;
use crate::config::{Config, OrchestratorConfig};
use crate::gateway::{EndpointCache, RevitGateway};
use crate::llm::{LLMError, LLMProvider, Message, MessageRole, ProviderClient, ProviderConfig, ProviderKind, ProviderTurn};
use crate::tools::{ToolRegistry, ToolRunner};
use sdk::errors::{EngineError, ErrorExt};
use sdk::types::{ToolCallRequest, ToolCallResult};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Inbound chat request, as sent by the chat front end
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub conversation: Vec<Message>,

    #[serde(default)]
    pub model: String,

    #[serde(default)]
    pub provider: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub server_url: Option<String>,

    #[serde(default)]
    pub ollama_model: Option<String>,
}

impl fmt::Debug for ChatRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatRequest")
            .field("messages", &self.conversation.len())
            .field("model", &self.model)
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("server_url", &self.server_url)
            .field("ollama_model", &self.ollama_model)
            .finish()
    }
}

impl ChatRequest {
    /// Resolve the provider selection and credentials for this request
    pub fn provider_config(&self) -> Result<ProviderConfig, EngineError> {
        let model = self.model.trim();
        if model.is_empty() {
            return Err(EngineError::InvalidRequest("'model' is required".to_string()));
        }

        let kind = match self.provider.as_deref().filter(|p| !p.trim().is_empty()) {
            Some(name) => ProviderKind::from_name(name)
                .ok_or_else(|| EngineError::InvalidRequest(format!("unknown provider '{}'", name)))?,
            None => ProviderKind::infer(model).ok_or_else(|| {
                EngineError::InvalidRequest(format!(
                    "cannot determine the provider for model '{}'",
                    model
                ))
            })?,
        };

        if kind != ProviderKind::Ollama {
            let key = self
                .api_key
                .as_deref()
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| EngineError::InvalidRequest(format!("'apiKey' is required for {}", kind)))?;
            return Ok(ProviderConfig::new(kind, model).with_api_key(key));
        }

        let local_model = self
            .ollama_model
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .or_else(|| model.strip_prefix("ollama-"))
            .unwrap_or(model);
        if local_model == "ollama" || local_model.is_empty() {
            return Err(EngineError::InvalidRequest(
                "'ollamaModel' is required for local models".to_string(),
            ));
        }

        let mut config = ProviderConfig::new(kind, local_model);
        let api_key = self.api_key.as_deref().filter(|k| !k.trim().is_empty());
        match self.server_url.as_deref().filter(|u| !u.trim().is_empty()) {
            Some(url) => {
                config = config.with_server_url(url);
                if let Some(key) = api_key {
                    config = config.with_api_key(key);
                }
            }
            // The front end historically put the Ollama server URL in the key field.
            None => {
                if let Some(url) = api_key.filter(|k| k.starts_with("http://") || k.starts_with("https://")) {
                    config = config.with_server_url(url);
                } else if let Some(key) = api_key {
                    config = config.with_api_key(key);
                }
            }
        }
        Ok(config)
    }
}

/// Result of one chat request
#[derive(Debug)]
pub struct ChatOutcome {
    /// Final assistant message shown to the user
    pub reply: String,

    /// Number of provider calls made
    pub turns: usize,

    /// Every tool call executed, in order
    pub tool_calls: Vec<ToolCallResult>,

    /// Set when the request ended in an error
    pub error: Option<EngineError>,
}

impl ChatOutcome {
    fn answered(reply: String, turns: usize, tool_calls: Vec<ToolCallResult>) -> Self {
        Self {
            reply,
            turns,
            tool_calls,
            error: None,
        }
    }

    fn failed(error: EngineError, turns: usize, tool_calls: Vec<ToolCallResult>) -> Self {
        let reply = format!("Error: {}. {}", error, error.user_hint());
        Self {
            reply,
            turns,
            tool_calls,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs chat requests against providers and the Revit listener
pub struct ConversationOrchestrator {
    registry: Arc<ToolRegistry>,
    gateway: Arc<RevitGateway>,
    client: ProviderClient,
    config: OrchestratorConfig,
}

impl ConversationOrchestrator {
    /// Build an orchestrator from configuration, sharing `cache` for the listener endpoint
    pub fn new(config: &Config, cache: EndpointCache) -> Result<Self, EngineError> {
        let gateway = RevitGateway::with_cache(config.listener.clone(), cache)?;
        let client = ProviderClient::new(config.llm.clone(), config.orchestrator.provider_timeout())?;

        Ok(Self::from_parts(
            Arc::new(ToolRegistry::builtin()),
            Arc::new(gateway),
            client,
            config.orchestrator.clone(),
        ))
    }

    pub fn from_parts(
        registry: Arc<ToolRegistry>,
        gateway: Arc<RevitGateway>,
        client: ProviderClient,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            registry,
            gateway,
            client,
            config,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn gateway(&self) -> &RevitGateway {
        &self.gateway
    }

    /// Handle one chat request end to end
    pub async fn run(&self, request: ChatRequest) -> ChatOutcome {
        if request.conversation.is_empty() {
            return ChatOutcome::failed(
                EngineError::InvalidRequest("'conversation' must contain at least one message".to_string()),
                0,
                Vec::new(),
            );
        }

        let provider_config = match request.provider_config() {
            Ok(config) => config,
            Err(e) => return ChatOutcome::failed(e, 0, Vec::new()),
        };

        info!("Chat request for {} ({})", provider_config.kind, provider_config.model);
        let provider = self.client.bind(provider_config);
        self.drive(&provider, request.conversation).await
    }

    /// Run the turn loop with any provider
    pub async fn drive(&self, provider: &dyn LLMProvider, conversation: Vec<Message>) -> ChatOutcome {
        let start = Instant::now();
        let runner = ToolRunner::new(Arc::clone(&self.registry), Arc::clone(&self.gateway));
        let specs = self.registry.list_specs();

        let mut messages = Vec::with_capacity(conversation.len() + 1);
        messages.push(Message::system(planning_prompt(&self.registry)));
        messages.extend(conversation.into_iter().filter(|m| m.role != MessageRole::System));

        let mut executed: Vec<ToolCallResult> = Vec::new();

        for turn in 1..=self.config.max_turns {
            debug!("Turn {}/{} with {}", turn, self.config.max_turns, provider.name());

            let response = match timeout(
                self.config.provider_timeout(),
                provider.complete(&messages, specs),
            )
            .await
            {
                Ok(response) => response,
                Err(_) => Err(LLMError::Timeout),
            };

            let (text, calls) = match response {
                Ok(ProviderTurn::FinalAnswer(answer)) => {
                    info!(
                        "Request answered after {} turns and {} tool calls in {}ms",
                        turn,
                        executed.len(),
                        start.elapsed().as_millis()
                    );
                    return ChatOutcome::answered(answer, turn, executed);
                }
                Ok(ProviderTurn::ToolCalls { text, calls }) => (text, calls),
                Err(e) => {
                    error!("{} failed on turn {}: {}", provider.name(), turn, e);
                    return ChatOutcome::failed(e.into(), turn, executed);
                }
            };

            if let Some(unknown) = calls.iter().find(|c| self.registry.get(&c.name).is_err()) {
                warn!("Provider requested unknown tool '{}'", unknown.name);
                return ChatOutcome::failed(EngineError::UnknownTool(unknown.name.clone()), turn, executed);
            }

            info!("Turn {}: {} tool call(s)", turn, calls.len());
            messages.push(Message::assistant_tool_calls(text.unwrap_or_default(), calls.clone()));

            for call in &calls {
                let result = self.dispatch(&runner, call).await;
                if let Some(failure) = &result.error {
                    warn!("Tool '{}' failed ({}): {}", call.name, failure.kind, failure.message);
                }
                messages.push(Message::tool_result(&result));
                executed.push(result);
            }
        }

        warn!("Turn budget of {} exhausted", self.config.max_turns);
        ChatOutcome::failed(
            EngineError::TurnBudgetExceeded(self.config.max_turns),
            self.config.max_turns,
            executed,
        )
    }

    async fn dispatch(&self, runner: &ToolRunner, call: &ToolCallRequest) -> ToolCallResult {
        match self.registry.get(&call.name) {
            Ok(spec) if spec.is_plan() => PlanExecutor::new(runner).run_call(call).await,
            _ => runner.execute(call).await,
        }
    }
}
