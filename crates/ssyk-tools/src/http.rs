use crate::server::McpServer;
use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ssyk_core::{SsykError, SsykResult};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Header carrying the MCP session identifier.
pub const SESSION_HEADER: &str = "mcp-session-id";

/// Build the HTTP router: `POST /mcp` for JSON-RPC and `GET /health`.
pub fn router(server: Arc<McpServer>) -> Router {
    Router::new()
        .route("/mcp", post(mcp_handler))
        .route("/health", get(health_handler))
        .with_state(server)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve_http(server: Arc<McpServer>, addr: SocketAddr) -> SsykResult<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "MCP server listening on HTTP");

    axum::serve(listener, router(server))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| SsykError::Http(format!("HTTP server error: {e}")))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn health_handler(State(server): State<Arc<McpServer>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "ssyk-mcp",
        "tools": server.registry().tool_count(),
    }))
}

async fn mcp_handler(
    State(server): State<Arc<McpServer>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let session = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let mut response = match server.handle_message(&body).await {
        Some(reply) => (StatusCode::OK, Json(reply)).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    };

    if let Ok(value) = HeaderValue::from_str(&session) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    response
}
