//! Local models served through Ollama's OpenAI-compatible endpoint

use super::openai::{decode_chat_completion, encode_chat_completion};
use super::{Message, ProviderAdapter, ProviderConfig, ProviderKind, ProviderTurn};
use crate::config::OllamaConfig;
use crate::tools::ToolSpec;
use serde_json::Value;

pub struct OllamaAdapter {
    config: OllamaConfig,
}

impl OllamaAdapter {
    pub fn new(config: OllamaConfig) -> Self {
        Self { config }
    }
}

impl ProviderAdapter for OllamaAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn endpoint(&self, config: &ProviderConfig) -> super::Result<String> {
        let server = config
            .server_url
            .as_deref()
            .unwrap_or(&self.config.base_url)
            .trim_end_matches('/');
        let server = server.strip_suffix("/v1").unwrap_or(server);
        Ok(format!("{}/{}", server, self.config.chat_path.trim_start_matches('/')))
    }

    fn headers(&self, config: &ProviderConfig) -> super::Result<Vec<(String, String)>> {
        Ok(config
            .api_key
            .as_ref()
            .map(|key| vec![("Authorization".to_string(), format!("Bearer {}", key))])
            .unwrap_or_default())
    }

    fn encode_request(
        &self,
        messages: &[Message],
        specs: &[ToolSpec],
        config: &ProviderConfig,
    ) -> super::Result<Value> {
        let mut payload = encode_chat_completion(&config.model, messages, specs);
        payload["stream"] = Value::Bool(false);
        Ok(payload)
    }

    fn decode_response(&self, body: Value) -> super::Result<ProviderTurn> {
        decode_chat_completion(body)
    }
}
