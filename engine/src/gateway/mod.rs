//! Revit listener gateway
//!
//! The listener is an HTTP API hosted inside Revit by a plugin. It binds one
//! of a few well-known ports, so the gateway probes the candidates in order,
//! caches the first that answers, and turns each tool call into a request
//! against that endpoint.
//!
//! # Retry policy
//!
//! - Connection refused: the request never reached the host, so the cache is
//!   invalidated, discovery runs once, and the call is re-sent once.
//! - 5xx or timeout: the host may have acted on the request, so the call is
//!   never re-sent. The cache is invalidated and the next call rediscovers.

use crate::config::ListenerConfig;
use crate::tools::{HostRoute, HttpMethod};
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use sdk::errors::EngineError;
use sdk::types::{FailureKind, ToolCallRequest, ToolCallResult};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const UNREACHABLE_HINT: &str =
    "Verify that Revit is open and the RevitMCP listener plugin is running";

/// A resolved listener address
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListenerEndpoint {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub base_path: String,

    /// When the endpoint last answered a probe (or was assumed, for the fallback)
    pub last_seen: DateTime<Utc>,

    /// False when no candidate answered and this is the default port
    pub discovered: bool,
}

impl ListenerEndpoint {
    fn from_config(config: &ListenerConfig, port: u16, discovered: bool) -> Self {
        Self {
            scheme: config.scheme.clone(),
            host: config.host.clone(),
            port,
            base_path: config.base_path.clone(),
            last_seen: Utc::now(),
            discovered,
        }
    }

    pub fn base_url(&self) -> String {
        format!(
            "{}://{}:{}/{}",
            self.scheme,
            self.host,
            self.port,
            self.base_path.trim_matches('/')
        )
        .trim_end_matches('/')
        .to_string()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url(), path.trim_start_matches('/'))
    }
}

/// Process-wide cache of the current listener endpoint
#[derive(Debug, Clone, Default)]
pub struct EndpointCache {
    inner: Arc<RwLock<Option<ListenerEndpoint>>>,
}

impl EndpointCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> Option<ListenerEndpoint> {
        self.inner.read().await.clone()
    }

    pub async fn set(&self, endpoint: ListenerEndpoint) {
        *self.inner.write().await = Some(endpoint);
    }

    pub async fn invalidate(&self) {
        *self.inner.write().await = None;
    }
}

/// Executes tool calls against the Revit listener
pub struct RevitGateway {
    client: Client,
    config: ListenerConfig,
    cache: EndpointCache,
}

impl RevitGateway {
    pub fn new(config: ListenerConfig) -> Result<Self, EngineError> {
        Self::with_cache(config, EndpointCache::new())
    }

    /// Create a gateway sharing an existing endpoint cache
    pub fn with_cache(config: ListenerConfig, cache: EndpointCache) -> Result<Self, EngineError> {
        let client = Client::builder()
            .build()
            .map_err(|e| EngineError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            cache,
        })
    }

    pub fn cache(&self) -> &EndpointCache {
        &self.cache
    }

    /// Probe every candidate port in order and return the first live endpoint.
    ///
    /// A probe counts as alive when `GET {base}/project_info` answers with
    /// 200, 404 or 405 within the probe timeout.
    pub async fn discover(&self) -> Result<ListenerEndpoint, EngineError> {
        for &port in &self.config.candidate_ports {
            let candidate = ListenerEndpoint::from_config(&self.config, port, true);
            let probe_url = candidate.url("/project_info");
            debug!("Probing Revit listener at {}", probe_url);

            match self
                .client
                .get(&probe_url)
                .timeout(self.config.probe_timeout())
                .send()
                .await
            {
                Ok(resp)
                    if matches!(
                        resp.status(),
                        StatusCode::OK | StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED
                    ) =>
                {
                    info!("Detected Revit listener on port {}", port);
                    return Ok(candidate);
                }
                Ok(resp) => debug!("Port {} answered with {}", port, resp.status()),
                Err(e) => debug!("Port {} did not answer: {}", port, e),
            }
        }

        Err(EngineError::ListenerUnreachable(format!(
            "no listener answered on {}://{} ports {:?}. {}",
            self.config.scheme, self.config.host, self.config.candidate_ports, UNREACHABLE_HINT
        )))
    }

    /// Cached endpoint, discovering one if the cache is empty.
    ///
    /// Falls back to the default port when discovery fails so that a listener
    /// started later can still be reached.
    pub async fn resolve(&self) -> ListenerEndpoint {
        self.resolve_tracked().await.0
    }

    /// Like [`resolve`](Self::resolve), also reporting whether the candidate
    /// ports were swept to produce the endpoint.
    async fn resolve_tracked(&self) -> (ListenerEndpoint, bool) {
        if let Some(endpoint) = self.cache.get().await {
            return (endpoint, false);
        }

        let endpoint = match self.discover().await {
            Ok(endpoint) => endpoint,
            Err(e) => {
                warn!("{}; falling back to port {}", e, self.config.default_port);
                ListenerEndpoint::from_config(&self.config, self.config.default_port, false)
            }
        };
        self.cache.set(endpoint.clone()).await;
        (endpoint, true)
    }

    /// Execute one tool call against its host route.
    ///
    /// The candidate ports are swept at most once per call.
    pub async fn invoke(&self, call: &ToolCallRequest, route: &HostRoute) -> ToolCallResult {
        let (endpoint, swept) = self.resolve_tracked().await;
        info!("Calling Revit listener: {} {} for '{}'", method_name(route.method), route.path, call.name);

        match self.send(&endpoint, route, &call.arguments).await {
            Ok(resp) => self.interpret(call, resp).await,
            Err(_) if swept && !endpoint.discovered => {
                // Discovery already failed for this call; the fallback stays cached.
                ToolCallResult::failure(
                    &call.id,
                    &call.name,
                    FailureKind::ListenerUnreachable,
                    format!(
                        "Could not reach the Revit listener at {}. {}",
                        endpoint.base_url(),
                        UNREACHABLE_HINT
                    ),
                )
            }
            Err(e) if e.is_connect() && !e.is_timeout() => {
                warn!("Connection to {} refused, re-detecting listener", endpoint.base_url());
                self.cache.invalidate().await;

                match self.discover().await {
                    Ok(fresh) => {
                        self.cache.set(fresh.clone()).await;
                        info!("Retrying '{}' on {}", call.name, fresh.base_url());
                        match self.send(&fresh, route, &call.arguments).await {
                            Ok(resp) => self.interpret(call, resp).await,
                            Err(e) => self.transport_failure(call, &fresh, e).await,
                        }
                    }
                    Err(e) => {
                        let fallback = ListenerEndpoint::from_config(
                            &self.config,
                            self.config.default_port,
                            false,
                        );
                        self.cache.set(fallback).await;
                        ToolCallResult::failure(
                            &call.id,
                            &call.name,
                            FailureKind::ListenerUnreachable,
                            e.to_string(),
                        )
                    }
                }
            }
            Err(e) => self.transport_failure(call, &endpoint, e).await,
        }
    }

    async fn send(
        &self,
        endpoint: &ListenerEndpoint,
        route: &HostRoute,
        args: &Map<String, Value>,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let url = endpoint.url(&route.path);
        debug!("{} {} with payload {:?}", method_name(route.method), url, args);

        let request = match route.method {
            HttpMethod::Get => self.client.get(&url).query(&query_pairs(args)),
            HttpMethod::Post => self.client.post(&url).json(args),
        };

        request
            .timeout(self.config.request_timeout())
            .send()
            .await
    }

    async fn interpret(&self, call: &ToolCallRequest, resp: reqwest::Response) -> ToolCallResult {
        let status = resp.status();
        let body = match resp.text().await {
            Ok(text) => text,
            Err(e) => {
                self.cache.invalidate().await;
                return ToolCallResult::failure(
                    &call.id,
                    &call.name,
                    FailureKind::HostUnavailable,
                    format!("Failed to read listener response for '{}': {}", call.name, e),
                );
            }
        };
        let parsed: Option<Value> = serde_json::from_str(&body).ok();

        if status.is_success() {
            let payload = parsed.unwrap_or_else(|| json!({"response": body}));
            if payload.get("status").and_then(Value::as_str) == Some("error") {
                let message = host_message(&payload)
                    .unwrap_or_else(|| format!("Revit reported an error for '{}'", call.name));
                return ToolCallResult::failure(&call.id, &call.name, FailureKind::ToolExecution, message)
                    .with_details(payload);
            }
            debug!("Listener success for '{}': {}", call.name, payload);
            return ToolCallResult::success(&call.id, &call.name, payload);
        }

        let detail = parsed
            .as_ref()
            .and_then(host_message)
            .unwrap_or_else(|| body.chars().take(200).collect());
        let message = format!("HTTP {}: {}", status.as_u16(), detail);

        let kind = if status.is_server_error() {
            warn!("Listener returned {} for '{}'; endpoint will be re-detected", status, call.name);
            self.cache.invalidate().await;
            FailureKind::HostUnavailable
        } else {
            warn!("Listener rejected '{}': {}", call.name, message);
            FailureKind::ToolExecution
        };

        let result = ToolCallResult::failure(&call.id, &call.name, kind, message);
        match parsed {
            Some(details) => result.with_details(details),
            None => result,
        }
    }

    async fn transport_failure(
        &self,
        call: &ToolCallRequest,
        endpoint: &ListenerEndpoint,
        error: reqwest::Error,
    ) -> ToolCallResult {
        self.cache.invalidate().await;

        if !endpoint.discovered {
            return ToolCallResult::failure(
                &call.id,
                &call.name,
                FailureKind::ListenerUnreachable,
                format!(
                    "Could not reach the Revit listener at {}. {}",
                    endpoint.base_url(),
                    UNREACHABLE_HINT
                ),
            );
        }

        let message = if error.is_timeout() {
            format!(
                "Request to {} for '{}' timed out after {}s",
                endpoint.base_url(),
                call.name,
                self.config.request_timeout_secs
            )
        } else {
            format!("Error communicating with {} for '{}': {}", endpoint.base_url(), call.name, error)
        };
        warn!("{}", message);

        ToolCallResult::failure(&call.id, &call.name, FailureKind::HostUnavailable, message)
    }
}

fn method_name(method: HttpMethod) -> &'static str {
    match method {
        HttpMethod::Get => "GET",
        HttpMethod::Post => "POST",
    }
}

fn host_message(payload: &Value) -> Option<String> {
    payload
        .get("message")
        .or_else(|| payload.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn query_pairs(args: &Map<String, Value>) -> Vec<(String, String)> {
    args.iter()
        .map(|(k, v)| {
            let value = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect()
}
