//! Command handlers for CLI operations
//!
//! - serve: run the chat server until Ctrl-C
//! - probe: run listener discovery once
//! - tools: print the tool catalog
//! - config: print the effective configuration

use anyhow::{Context, Result};
use serde_json::json;
use std::sync::Arc;

use crate::agent::ConversationOrchestrator;
use crate::config::Config;
use crate::gateway::{EndpointCache, RevitGateway};
use crate::server::{ChatServer, ServerState};
use crate::tools::ToolRegistry;

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Run the chat server until interrupted
pub async fn handle_serve(config: &Config, bind: Option<String>, format: OutputFormat) -> Result<()> {
    let cache = EndpointCache::new();
    let orchestrator = ConversationOrchestrator::new(config, cache.clone())
        .context("Failed to initialize the orchestrator")?;

    // Warm the endpoint cache; a miss here is not fatal.
    match orchestrator.gateway().discover().await {
        Ok(endpoint) => {
            tracing::info!("Revit listener found at {}", endpoint.base_url());
            cache.set(endpoint).await;
        }
        Err(e) => tracing::warn!("{}", e),
    }

    let addr = bind.unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.port));
    let server = ChatServer::start(ServerState::new(Arc::new(orchestrator), cache), &addr)
        .await
        .with_context(|| format!("Failed to start the chat server on {}", addr))?;

    match format {
        OutputFormat::Text => println!("Chat server listening on http://{}", server.addr()),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "status": "listening",
                "addr": server.addr().to_string(),
            }))?
        ),
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("Shutdown requested");
    server.stop().await;
    Ok(())
}

/// Probe the candidate ports once and report the listener
pub async fn handle_probe(config: &Config, format: OutputFormat) -> Result<()> {
    let gateway = RevitGateway::new(config.listener.clone()).context("Failed to build the listener client")?;
    let result = gateway.discover().await;

    match (format, result) {
        (OutputFormat::Text, Ok(endpoint)) => {
            println!("✓ Revit listener found");
            println!("  URL: {}", endpoint.base_url());
        }
        (OutputFormat::Text, Err(e)) => {
            println!("✗ {}", e);
            println!(
                "  Ports tried: {}",
                config
                    .listener
                    .candidate_ports
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        (OutputFormat::Json, Ok(endpoint)) => {
            let output = json!({
                "status": "found",
                "endpoint": endpoint,
                "url": endpoint.base_url(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        (OutputFormat::Json, Err(e)) => {
            let output = json!({
                "status": "unreachable",
                "error": e.to_string(),
                "candidate_ports": config.listener.candidate_ports,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

/// Print the tool catalog
pub fn handle_tools(format: OutputFormat) -> Result<()> {
    let registry = ToolRegistry::builtin();

    match format {
        OutputFormat::Text => {
            println!("Available tools ({}):", registry.list_specs().len());
            println!();
            for spec in registry.list_specs() {
                let params: Vec<String> = spec
                    .params
                    .iter()
                    .map(|p| {
                        if p.required {
                            p.name.clone()
                        } else {
                            format!("{}?", p.name)
                        }
                    })
                    .collect();
                println!("  {}({})", spec.name, params.join(", "));
            }
        }
        OutputFormat::Json => {
            let tools: Vec<_> = registry
                .list_specs()
                .iter()
                .map(|spec| {
                    json!({
                        "name": spec.name,
                        "description": spec.description,
                        "parameters": spec.json_schema(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&tools)?);
        }
    }
    Ok(())
}

/// Print the effective configuration
pub fn handle_config(config: &Config, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            let text = config.to_toml_string().context("Failed to render configuration")?;
            print!("{}", text);
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
    }
    Ok(())
}
