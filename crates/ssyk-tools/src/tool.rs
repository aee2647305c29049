use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ssyk_core::{SsykResult, ToolCall, ToolResult};

/// Metadata describing a tool's name and argument schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique tool name.
    pub name: String,
    /// What the tool does, shown to the agent.
    pub description: String,
    /// JSON Schema of the `arguments` object.
    pub parameters_schema: serde_json::Value,
}

/// A callable tool exposed to the agent.
///
/// Argument problems are reported as error [`ToolResult`]s; an `Err` is
/// reserved for faults the tool could not turn into a result.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name, description and argument schema.
    fn descriptor(&self) -> &ToolDescriptor;

    /// Run the tool with the call's arguments.
    async fn execute(&self, call: ToolCall) -> SsykResult<ToolResult>;
}
