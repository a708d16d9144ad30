//! RevitMCP SDK
//!
//! Shared library providing the error taxonomy and the canonical tool-call
//! types used by the engine and its tests.

/// Error types and handling
pub mod errors;

/// Tool call request/result types
pub mod types;

// Re-export commonly used types
pub use errors::{EngineError, ErrorExt};
pub use types::{FailureKind, ToolCallRequest, ToolCallResult, ToolFailure};
