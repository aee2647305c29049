#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Integration tests for ssyk-tools: both tools behind the MCP server, over
//! the dispatcher and over HTTP.

use ssyk_search::{DisabledEmbedding, DocumentRecord, HybridSearchEngine, InMemoryCorpusSource};
use ssyk_tools::http::{router, SESSION_HEADER};
use ssyk_tools::{default_registry, IncomeStatsCache, McpServer};
use std::sync::Arc;
use tokio::net::TcpListener;

fn build_server(dir: &std::path::Path) -> Arc<McpServer> {
    let engine = HybridSearchEngine::new(
        Arc::new(InMemoryCorpusSource::new(vec![
            DocumentRecord::new("2512", "Systemvetare", "Arbetar med IT-system"),
            DocumentRecord::new("3313", "Ekonomiassistent", "Arbetar med bokföring"),
        ])),
        Arc::new(DisabledEmbedding),
    );

    let stats = dir.join("income_stats.json");
    std::fs::write(
        &stats,
        r#"{"2512": {"Medianlön": 52000, "10:e percentilen": 38000}}"#,
    )
    .unwrap();

    let registry = default_registry(Arc::new(engine), Arc::new(IncomeStatsCache::new(stats)));
    Arc::new(McpServer::new(Arc::new(registry)))
}

fn tool_call(id: u64, name: &str, arguments: serde_json::Value) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": { "name": name, "arguments": arguments }
    })
    .to_string()
}

/// Parse the JSON text block of a successful `tools/call` response.
fn tool_payload(response: &serde_json::Value) -> serde_json::Value {
    assert_eq!(response["result"]["isError"], false, "{response}");
    let text = response["result"]["content"][0]["text"].as_str().unwrap();
    serde_json::from_str(text).unwrap()
}

#[tokio::test]
async fn test_tools_list_contains_both_tools() {
    let dir = tempfile::tempdir().unwrap();
    let server = build_server(dir.path());

    let resp = server
        .handle_message(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#)
        .await
        .unwrap();
    let tools = serde_json::to_value(resp.result.unwrap()).unwrap()["tools"].clone();
    let names: Vec<&str> = tools
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["classify_occupation", "get_income_statistics"]);
}

#[tokio::test]
async fn test_classify_then_income() {
    let dir = tempfile::tempdir().unwrap();
    let server = build_server(dir.path());

    let resp = server
        .handle_message(&tool_call(
            1,
            "classify_occupation",
            serde_json::json!({"title": "IT", "description": "systemutveckling"}),
        ))
        .await
        .unwrap();
    let matches = tool_payload(&serde_json::to_value(resp).unwrap());
    let code = matches[0]["ssyk_code"].as_str().unwrap().to_string();
    assert_eq!(code, "2512");

    let resp = server
        .handle_message(&tool_call(
            2,
            "get_income_statistics",
            serde_json::json!({ "ssyk_code": code }),
        ))
        .await
        .unwrap();
    let stats = tool_payload(&serde_json::to_value(resp).unwrap());
    assert_eq!(stats["ssyk_code"], "2512");
    assert_eq!(stats["Medianlön"], 52000);
}

#[tokio::test]
async fn test_unknown_income_code_is_explicit_error_body() {
    let dir = tempfile::tempdir().unwrap();
    let server = build_server(dir.path());

    let resp = server
        .handle_message(&tool_call(
            3,
            "get_income_statistics",
            serde_json::json!({"ssyk_code": "9999"}),
        ))
        .await
        .unwrap();
    let body = tool_payload(&serde_json::to_value(resp).unwrap());
    assert_eq!(body["error"], "No income data found for SSYK code 9999");
}

async fn start_http(server: Arc<McpServer>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(server)).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_http_health_and_mcp() {
    let dir = tempfile::tempdir().unwrap();
    let base = start_http(build_server(dir.path())).await;
    let client = reqwest::Client::new();

    let health: serde_json::Value = client
        .get(format!("{base}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["tools"], 2);

    let resp = client
        .post(format!("{base}/mcp"))
        .header("content-type", "application/json")
        .body(tool_call(
            1,
            "classify_occupation",
            serde_json::json!({"title": "Ekonomiassistent"}),
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.headers().get(SESSION_HEADER).is_some());
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(tool_payload(&body)[0]["ssyk_code"], "3313");
}

#[tokio::test]
async fn test_http_session_header_echoed_and_notifications_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let base = start_http(build_server(dir.path())).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/mcp"))
        .header(SESSION_HEADER, "session-1")
        .body(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 202);
    assert_eq!(resp.headers()[SESSION_HEADER], "session-1");

    let resp = client
        .post(format!("{base}/mcp"))
        .body("not json")
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], -32700);
}
