//! Canonical tool-call types
//!
//! Every provider adapter decodes vendor responses into `ToolCallRequest`s and
//! every execution path (gateway, local tools, plans) produces
//! `ToolCallResult`s. These are the only shapes that cross component
//! boundaries.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A tool invocation requested by an LLM provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Opaque per-provider call identifier, echoed back on the result message
    pub id: String,

    /// Name of the tool to call
    pub name: String,

    /// Concrete argument values
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCallRequest {
    /// Create a new tool call request
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Get a string argument
    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(|v| v.as_str())
    }
}

/// Classification of a failed tool call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The host rejected the call (unknown element, bad geometry, ...)
    ToolExecution,

    /// The host answered with a 5xx, timed out, or dropped the connection
    HostUnavailable,

    /// No listener answered on any candidate port
    ListenerUnreachable,

    /// Arguments did not match the tool schema
    InvalidArguments,

    /// A plan's reference graph was malformed
    InvalidPlan,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::ToolExecution => write!(f, "tool_execution"),
            FailureKind::HostUnavailable => write!(f, "host_unavailable"),
            FailureKind::ListenerUnreachable => write!(f, "listener_unreachable"),
            FailureKind::InvalidArguments => write!(f, "invalid_arguments"),
            FailureKind::InvalidPlan => write!(f, "invalid_plan"),
        }
    }
}

/// Failure detail carried by an unsuccessful `ToolCallResult`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFailure {
    pub kind: FailureKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Outcome of executing one tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Identifier of the request this result answers
    pub call_id: String,

    /// Name of the tool that ran
    pub tool_name: String,

    /// Whether the tool succeeded
    pub success: bool,

    /// Structured payload (empty object on failure unless the host sent one)
    pub payload: Value,

    /// Failure detail, present iff `success` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolFailure>,
}

impl ToolCallResult {
    /// Create a successful result
    pub fn success(call_id: impl Into<String>, tool_name: impl Into<String>, payload: Value) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            success: true,
            payload,
            error: None,
        }
    }

    /// Create a failed result
    pub fn failure(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        kind: FailureKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            success: false,
            payload: Value::Object(Map::new()),
            error: Some(ToolFailure {
                kind,
                message: message.into(),
                details: None,
            }),
        }
    }

    /// Attach host-supplied details to a failure
    pub fn with_details(mut self, details: Value) -> Self {
        if let Some(ref mut failure) = self.error {
            failure.details = Some(details);
        }
        self
    }

    /// Failure kind, if this result is a failure
    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    /// Render the result as the JSON value shown to the LLM.
    ///
    /// Successful results are the raw payload; failures become a
    /// `{"status": "error", ...}` object so every vendor sees the same shape.
    pub fn to_content_value(&self) -> Value {
        match &self.error {
            None => self.payload.clone(),
            Some(failure) => {
                let mut obj = Map::new();
                obj.insert("status".into(), Value::String("error".into()));
                obj.insert("error_kind".into(), Value::String(failure.kind.to_string()));
                obj.insert("message".into(), Value::String(failure.message.clone()));
                if let Some(details) = &failure.details {
                    obj.insert("details".into(), details.clone());
                }
                Value::Object(obj)
            }
        }
    }

    /// Render the result as a JSON string for tool-result messages
    pub fn to_content_string(&self) -> String {
        self.to_content_value().to_string()
    }
}
