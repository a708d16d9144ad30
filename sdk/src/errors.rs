//! Error types and handling
//!
//! This module provides the error taxonomy used throughout the RevitMCP engine.
//! All errors implement the `ErrorExt` trait which provides user-friendly
//! hints, indicates whether errors are recoverable, and tells the inbound
//! chat endpoint whether the caller or the system is at fault.
//!
//! # Security
//!
//! Error messages never include the caller's API credentials. Provider
//! adapters strip keys from URLs before building error text.

use thiserror::Error;

/// Trait for engine error extensions
///
/// Provides additional context for errors, including user-friendly hints and
/// recoverability information. All engine errors implement this trait.
pub trait ErrorExt {
    /// Returns a user-friendly hint for the error
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be fixed by the model in a following turn or by
    /// retrying the request later. Non-recoverable errors end the request.
    fn is_recoverable(&self) -> bool;

    /// Returns true when the error was caused by the request itself rather
    /// than by a provider, the host listener or the engine.
    fn is_caller_error(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Registry**: unknown tools, schema violations
/// - **Provider**: vendor transport failures and malformed vendor responses
/// - **Listener**: host listener unreachable, host-reported tool failures
/// - **Planning**: malformed plan reference graphs
/// - **Orchestration**: runaway tool-call loops
/// - **Configuration**: invalid or missing configuration
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, ErrorExt};
///
/// let error = EngineError::UnknownTool("make_coffee".to_string());
/// assert!(error.is_caller_error());
/// assert!(!error.is_recoverable());
///
/// let error = EngineError::ToolExecution("Element 42 not found".to_string());
/// assert!(error.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Registry errors
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for tool '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    // Provider errors
    #[error("Provider transport error: {0}")]
    ProviderTransport(String),

    #[error("Provider protocol error: {0}")]
    ProviderProtocol(String),

    // Host listener errors
    #[error("Revit listener unreachable: {0}")]
    ListenerUnreachable(String),

    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    // Planning errors
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    // Orchestration errors
    #[error("Turn budget exceeded after {0} provider turns")]
    TurnBudgetExceeded(usize),

    // Inbound request errors
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::UnknownTool(_) => "The requested tool is not available",
            Self::InvalidArguments { .. } => "Tool arguments do not match the tool schema",

            Self::ProviderTransport(_) => {
                "Could not reach the LLM provider. Check your API key, network and model name"
            }
            Self::ProviderProtocol(_) => {
                "The LLM provider returned a response that could not be understood"
            }

            Self::ListenerUnreachable(_) => {
                "Verify that Revit is open and the RevitMCP listener plugin is running"
            }
            Self::ToolExecution(_) => "Revit rejected the operation",

            Self::InvalidPlan(_) => "The execution plan references steps that have not run yet",
            Self::TurnBudgetExceeded(_) => {
                "The request needed too many steps. Try breaking it into smaller requests"
            }

            Self::InvalidRequest(_) => "The chat request is missing required fields",
            Self::Config(_) => "Check your config.toml file for errors",
            Self::Network(_) => "Network operation failed. Check your connection",
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::UnknownTool(_) | Self::TurnBudgetExceeded(_) | Self::Config(_) => false,
            _ => true,
        }
    }

    fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownTool(_) | Self::InvalidArguments { .. } | Self::InvalidRequest(_)
        )
    }
}
