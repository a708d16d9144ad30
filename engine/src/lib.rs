//! RevitMCP Engine Library
//!
//! Provider-agnostic tool-calling bridge between LLM vendors and a running
//! Revit instance. Used by the `revit-mcp` binary and integration tests.

/// Configuration management module
pub mod config;

/// Tool catalog, argument validation and dispatch
pub mod tools;

/// Revit listener discovery and calls
pub mod gateway;

/// LLM provider adapters and transport
pub mod llm;

/// Multi-step plan execution
pub mod conductor;

/// Conversation loop
pub mod agent;

/// Chat HTTP server
pub mod server;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
