//! Outbound HTTP transport shared by every adapter

use super::{adapter_for, LLMError, LLMProvider, Message, ProviderConfig, ProviderTurn};
use crate::config::LLMConfig;
use crate::tools::ToolSpec;
use async_trait::async_trait;
use sdk::errors::EngineError;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Sends adapter-encoded requests and decodes the responses.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct ProviderClient {
    http: reqwest::Client,
    llm: Arc<LLMConfig>,
}

impl ProviderClient {
    pub fn new(llm: LLMConfig, timeout: Duration) -> Result<Self, EngineError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            llm: Arc::new(llm),
        })
    }

    /// One round trip: encode, send, check status, decode
    pub async fn send(
        &self,
        config: &ProviderConfig,
        messages: &[Message],
        specs: &[ToolSpec],
    ) -> super::Result<ProviderTurn> {
        let adapter = adapter_for(config.kind, &self.llm);
        let url = adapter.endpoint(config)?;
        let headers = adapter.headers(config)?;
        let payload = adapter.encode_request(messages, specs, config)?;

        info!(
            "Sending {} messages to {} ({})",
            messages.len(),
            config.kind,
            config.model
        );
        debug!("{} request body: {}", config.kind, payload);

        let mut request = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&payload);
        for (name, value) in &headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                LLMError::Timeout
            } else {
                // Gemini carries the key in the query string
                LLMError::NetworkError(e.without_url().to_string())
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!("{} returned {}", config.kind, status);

            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(LLMError::AuthenticationFailed(truncate(&text)));
            } else if status.as_u16() == 429 {
                return Err(LLMError::RateLimitExceeded);
            } else {
                return Err(LLMError::InvalidRequest(format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    truncate(&text)
                )));
            }
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(e.without_url().to_string()))?;
        debug!("{} response body: {}", config.kind, data);

        adapter.decode_response(data)
    }

    /// Bind a per-request provider selection to this client
    pub fn bind(&self, config: ProviderConfig) -> RemoteProvider {
        RemoteProvider {
            client: self.clone(),
            config,
        }
    }
}

fn truncate(text: &str) -> String {
    const LIMIT: usize = 500;
    if text.chars().count() <= LIMIT {
        text.to_string()
    } else {
        let cut: String = text.chars().take(LIMIT).collect();
        format!("{}...", cut)
    }
}

/// A vendor selected for one chat request
pub struct RemoteProvider {
    client: ProviderClient,
    config: ProviderConfig,
}

impl RemoteProvider {
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

#[async_trait]
impl LLMProvider for RemoteProvider {
    fn name(&self) -> &str {
        self.config.kind.as_str()
    }

    async fn complete(&self, messages: &[Message], specs: &[ToolSpec]) -> super::Result<ProviderTurn> {
        self.client.send(&self.config, messages, specs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short"), "short");
        let long = "x".repeat(600);
        let cut = truncate(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.len(), 503);
    }
}
