//! Core types and error definitions shared by the SSYK workspace crates.
//!
//! # Main types
//!
//! - [`SsykError`]: Unified error enum for all subsystems.
//! - [`SsykResult`]: Convenience alias for `Result<T, SsykError>`.
//! - [`ToolCall`]: An agent-initiated tool invocation request.
//! - [`ToolResult`]: The result returned after executing a tool call.

use serde::{Deserialize, Serialize};

// --- Error types ---

/// Top-level error type for the SSYK workspace.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Debug, thiserror::Error)]
pub enum SsykError {
    /// The occupation corpus could not be loaded or is inconsistent.
    #[error("Corpus error: {0}")]
    Corpus(String),

    /// The embedding provider failed or returned unusable data.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// An error raised by a tool during invocation.
    #[error("Tool error: {0}")]
    Tool(String),

    /// An error from an outbound HTTP request.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`SsykError`].
pub type SsykResult<T> = Result<T, SsykError>;

// --- Tool types ---

/// A request from the agent runtime to invoke a named tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier of the call, echoed back in the [`ToolResult`].
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON arguments to pass to the tool.
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Creates a tool call with the given id, name and arguments.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Returns a string argument, treating missing and non-string values as absent.
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(serde_json::Value::as_str)
    }
}

/// The result returned after executing a [`ToolCall`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The ID of the [`ToolCall`] this result corresponds to.
    pub call_id: String,
    /// The textual output produced by the tool (JSON for the SSYK tools).
    pub content: String,
    /// Whether the tool execution ended in an error.
    pub is_error: bool,
}

impl ToolResult {
    /// Creates a successful tool result.
    pub fn success(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    /// Creates a successful tool result carrying a JSON document.
    pub fn json(call_id: impl Into<String>, value: &serde_json::Value) -> Self {
        Self::success(call_id, value.to_string())
    }

    /// Creates an error tool result.
    pub fn error(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: true,
        }
    }
}
