//! Chat HTTP server
//!
//! # Endpoints
//!
//! - POST /chat_api - Run one chat request through the orchestrator
//! - GET /api/tools - Tool catalog as JSON
//! - GET /api/status - Cached listener endpoint and build info

use crate::agent::{ChatOutcome, ChatRequest, ConversationOrchestrator};
use crate::gateway::EndpointCache;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use sdk::errors::{EngineError, ErrorExt};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// State shared across handlers
#[derive(Clone)]
pub struct ServerState {
    orchestrator: Arc<ConversationOrchestrator>,
    cache: EndpointCache,
}

impl ServerState {
    pub fn new(orchestrator: Arc<ConversationOrchestrator>, cache: EndpointCache) -> Self {
        Self { orchestrator, cache }
    }
}

/// Build the router with all endpoints
pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/chat_api", post(chat_handler))
        .route("/api/tools", get(tools_handler))
        .route("/api/status", get(status_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// HTTP status for an error that ended a chat request
pub fn status_for(error: &EngineError) -> StatusCode {
    if error.is_caller_error() {
        return StatusCode::BAD_REQUEST;
    }
    match error {
        EngineError::ProviderTransport(_) | EngineError::ProviderProtocol(_) => StatusCode::BAD_GATEWAY,
        EngineError::ListenerUnreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn outcome_response(outcome: ChatOutcome) -> Response {
    match outcome.error {
        None => (
            StatusCode::OK,
            Json(json!({
                "reply": outcome.reply,
                "turns": outcome.turns,
                "tool_calls": outcome.tool_calls,
            })),
        )
            .into_response(),
        Some(error) if error.is_caller_error() => {
            (status_for(&error), Json(json!({"error": error.to_string()}))).into_response()
        }
        Some(error) => (
            status_for(&error),
            Json(json!({
                "error": error.to_string(),
                "reply": outcome.reply,
                "turns": outcome.turns,
                "tool_calls": outcome.tool_calls,
            })),
        )
            .into_response(),
    }
}

async fn chat_handler(
    State(state): State<ServerState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            tracing::warn!("Rejected chat request: {}", rejection.body_text());
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": format!("Invalid request body: {}", rejection.body_text())})),
            )
                .into_response();
        }
    };

    tracing::debug!("Chat request: {:?}", request);
    let outcome = state.orchestrator.run(request).await;
    outcome_response(outcome)
}

async fn tools_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let tools: Vec<_> = state
        .orchestrator
        .registry()
        .list_specs()
        .iter()
        .map(|spec| {
            json!({
                "name": spec.name,
                "description": spec.description,
                "parameters": spec.json_schema(),
                "execution": spec.execution,
            })
        })
        .collect();
    Json(json!({ "tools": tools }))
}

async fn status_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let listener = state.cache.get().await;
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "commit": env!("GIT_COMMIT_HASH"),
        "built": env!("BUILD_TIMESTAMP"),
        "listener": listener,
    }))
}

/// A running chat server
pub struct ChatServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl ChatServer {
    /// Bind `addr` and serve in a background task
    pub async fn start(state: ServerState, addr: &str) -> Result<Self, EngineError> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| EngineError::Network(format!("Failed to bind to {}: {}", addr, e)))?;

        let addr = listener
            .local_addr()
            .map_err(|e| EngineError::Network(format!("Failed to get local address: {}", e)))?;

        let app = router(state);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            tracing::info!("Chat server listening on http://{}", addr);

            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_rx.await.ok();
                    tracing::info!("Chat server shutting down gracefully");
                })
                .await
                .unwrap_or_else(|e| {
                    tracing::error!("Chat server error: {}", e);
                });
        });

        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            handle,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait for in-flight requests
    pub async fn stop(mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            shutdown_tx.send(()).ok();
        }
        if let Err(e) = self.handle.await {
            tracing::error!("Chat server task failed: {}", e);
        }
        tracing::info!("Chat server stopped");
    }
}
