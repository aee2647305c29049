#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Integration tests for ssyk-core: errors and tool call/result types.

use ssyk_core::*;

// ---------------------------------------------------------------------------
// 1. ToolCall -> ToolResult flow (success and error variants)
// ---------------------------------------------------------------------------

#[test]
fn tool_call_to_tool_result_flow() {
    let tool_call = ToolCall::new(
        "call_abc123",
        "classify_occupation",
        serde_json::json!({"title": "Systemutvecklare"}),
    );

    let success_result = ToolResult::json(&tool_call.id, &serde_json::json!([]));
    assert_eq!(success_result.call_id, tool_call.id);
    assert_eq!(success_result.content, "[]");
    assert!(!success_result.is_error);

    let error_result = ToolResult::error(&tool_call.id, "Missing required argument: title");
    assert_eq!(error_result.call_id, tool_call.id);
    assert!(error_result.is_error);

    let json = serde_json::to_string(&tool_call).unwrap();
    let deserialized: ToolCall = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized.id, "call_abc123");
    assert_eq!(deserialized.name, "classify_occupation");
    assert_eq!(deserialized.str_arg("title"), Some("Systemutvecklare"));
}

#[test]
fn tool_call_without_arguments_deserializes() {
    let call: ToolCall = serde_json::from_str(r#"{"id":"1","name":"x"}"#).unwrap();
    assert!(call.arguments.is_null());
    assert_eq!(call.str_arg("title"), None);
}

// ---------------------------------------------------------------------------
// 2. Error Display and From impls
// ---------------------------------------------------------------------------

#[test]
fn error_display_and_from_impls() {
    let corpus_err = SsykError::Corpus("missing column 'title'".to_string());
    assert_eq!(corpus_err.to_string(), "Corpus error: missing column 'title'");

    let http_err = SsykError::Http("connection refused".to_string());
    assert_eq!(http_err.to_string(), "HTTP error: connection refused");

    let io_err: SsykError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
    assert!(matches!(io_err, SsykError::Io(_)));
    assert!(io_err.to_string().starts_with("IO error:"));

    let json_err: SsykError = serde_json::from_str::<serde_json::Value>("{not json")
        .unwrap_err()
        .into();
    assert!(matches!(json_err, SsykError::Json(_)));
}
