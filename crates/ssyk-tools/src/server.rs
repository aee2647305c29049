use crate::protocol::{
    InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse, McpToolDef, McpToolResult,
    ServerCapabilities, ServerInfo, ToolCallParams, INTERNAL_ERROR, JSONRPC_VERSION,
    PROTOCOL_VERSION,
};
use crate::registry::ToolRegistry;
use serde_json::Value;
use ssyk_core::ToolCall;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Transport-independent MCP request dispatcher.
///
/// Both the stdio and HTTP transports feed raw messages through
/// [`McpServer::handle_message`].
pub struct McpServer {
    registry: Arc<ToolRegistry>,
    info: ServerInfo,
    next_call_id: AtomicU64,
}

impl McpServer {
    /// Serve the tools in `registry`.
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            info: ServerInfo::default(),
            next_call_id: AtomicU64::new(1),
        }
    }

    /// The registry behind `tools/list` and `tools/call`.
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Handle one raw JSON-RPC message. Returns `None` for notifications.
    pub async fn handle_message(&self, raw: &str) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Unparseable JSON-RPC message");
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    JsonRpcError::parse_error(e),
                ));
            }
        };

        let id = value.get("id").cloned().unwrap_or(Value::Null);
        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) => self.handle(request).await,
            Err(e) => Some(JsonRpcResponse::failure(
                id,
                JsonRpcError::invalid_request(e),
            )),
        }
    }

    /// Handle a parsed request.
    pub async fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::failure(
                request.id.unwrap_or(Value::Null),
                JsonRpcError::invalid_request(format!(
                    "unsupported jsonrpc version {}",
                    request.jsonrpc
                )),
            ));
        }

        if request.is_notification() {
            debug!(method = %request.method, "Notification received");
            return None;
        }
        let id = request.id.clone().unwrap_or(Value::Null);

        debug!(method = %request.method, id = %id, "Request received");
        let outcome = match request.method.as_str() {
            "initialize" => self.initialize(request.params.as_ref()),
            "ping" => Ok(serde_json::json!({})),
            "tools/list" => Ok(self.list_tools()),
            "tools/call" => self.call_tool(request.params).await,
            other => Err(JsonRpcError::method_not_found(other)),
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(id, error),
        })
    }

    fn initialize(&self, params: Option<&Value>) -> Result<Value, JsonRpcError> {
        let client = params
            .and_then(|p| p.get("clientInfo"))
            .and_then(|c| c.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        info!(client = %client, "MCP client initialized");

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: serde_json::json!({ "listChanged": false }),
            },
            server_info: self.info.clone(),
        };
        serde_json::to_value(result).map_err(|e| JsonRpcError::new(INTERNAL_ERROR, e.to_string()))
    }

    fn list_tools(&self) -> Value {
        let tools: Vec<McpToolDef> = self
            .registry
            .list_descriptors()
            .into_iter()
            .map(|d| McpToolDef {
                name: d.name.clone(),
                description: d.description.clone(),
                input_schema: d.parameters_schema.clone(),
            })
            .collect();
        serde_json::json!({ "tools": tools })
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: ToolCallParams = params
            .ok_or_else(|| JsonRpcError::invalid_params("missing params"))
            .and_then(|p| serde_json::from_value(p).map_err(JsonRpcError::invalid_params))?;

        if self.registry.get(&params.name).is_none() {
            return Err(JsonRpcError::invalid_params(format!(
                "unknown tool {}",
                params.name
            )));
        }

        let call_id = format!("call-{}", self.next_call_id.fetch_add(1, Ordering::Relaxed));
        let arguments = params
            .arguments
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
        let call = ToolCall::new(call_id, params.name.clone(), arguments);

        let result = match self.registry.execute(call).await {
            Ok(result) => McpToolResult::text(result.content, result.is_error),
            Err(e) => {
                warn!(tool = %params.name, error = %e, "Tool execution failed");
                McpToolResult::text(e.to_string(), true)
            }
        };

        serde_json::to_value(result)
            .map_err(|e| JsonRpcError::new(INTERNAL_ERROR, e.to_string()))
    }
}
