use crate::tool::{Tool, ToolDescriptor};
use ssyk_core::{SsykError, SsykResult, ToolCall, ToolResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Central registry for the tools served to agents.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Add a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.descriptor().name.clone();
        info!(tool = %name, "Registered tool");
        self.tools.insert(name, tool);
    }

    /// Tool registered under `name`.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Descriptors sorted by tool name.
    pub fn list_descriptors(&self) -> Vec<&ToolDescriptor> {
        let mut descriptors: Vec<_> = self.tools.values().map(|t| t.descriptor()).collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    /// Dispatch a call to the named tool.
    pub async fn execute(&self, call: ToolCall) -> SsykResult<ToolResult> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| SsykError::Tool(format!("Unknown tool: {}", call.name)))?;

        debug!(tool = %call.name, call_id = %call.id, "Executing tool");
        tool.execute(call).await
    }

    /// Number of registered tools.
    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
