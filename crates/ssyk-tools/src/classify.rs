use crate::tool::{Tool, ToolDescriptor};
use async_trait::async_trait;
use ssyk_core::{SsykResult, ToolCall, ToolResult};
use ssyk_search::HybridSearchEngine;
use std::sync::Arc;
use tracing::info;

/// Upper bound on the `limit` argument.
const MAX_LIMIT: u64 = 50;

/// Build the search query from a job title and optional description.
pub fn build_query(title: &str, description: Option<&str>) -> String {
    let title = title.trim();
    match description.map(str::trim) {
        Some(description) if !description.is_empty() => format!("{title} {description}"),
        _ => title.to_string(),
    }
}

/// Tool that maps a job title (and description) to ranked SSYK codes.
pub struct ClassifyOccupationTool {
    descriptor: ToolDescriptor,
    engine: Arc<HybridSearchEngine>,
}

impl ClassifyOccupationTool {
    /// Classify against `engine`.
    pub fn new(engine: Arc<HybridSearchEngine>) -> Self {
        Self {
            descriptor: ToolDescriptor {
                name: "classify_occupation".to_string(),
                description: "Classifies an occupation based on title and description. \
                              Returns a list of matching SSYK codes with titles and \
                              similarity scores, best match first."
                    .to_string(),
                parameters_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "title": {
                            "type": "string",
                            "description": "The job title (e.g. \"Systemutvecklare\")"
                        },
                        "description": {
                            "type": "string",
                            "description": "A description of the tasks and responsibilities"
                        },
                        "limit": {
                            "type": "integer",
                            "description": "Maximum number of matches to return",
                            "minimum": 1,
                            "maximum": MAX_LIMIT
                        }
                    },
                    "required": ["title"]
                }),
            },
            engine,
        }
    }
}

#[async_trait]
impl Tool for ClassifyOccupationTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, call: ToolCall) -> SsykResult<ToolResult> {
        let title = call.str_arg("title").unwrap_or_default();
        if title.trim().is_empty() {
            return Ok(ToolResult::error(&call.id, "Missing required argument: title"));
        }

        let limit = match call.arguments.get("limit") {
            None | Some(serde_json::Value::Null) => self.engine.default_limit(),
            Some(value) => match value.as_u64() {
                Some(n) if (1..=MAX_LIMIT).contains(&n) => n as usize,
                _ => {
                    return Ok(ToolResult::error(
                        &call.id,
                        format!("limit must be an integer between 1 and {MAX_LIMIT}"),
                    ))
                }
            },
        };

        let query = build_query(title, call.str_arg("description"));
        let results = self.engine.search(&query, limit).await;

        info!(
            query = %query,
            matches = results.len(),
            top = results.first().map(|r| r.code.as_str()),
            "Classified occupation"
        );

        Ok(ToolResult::json(&call.id, &serde_json::to_value(&results)?))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use ssyk_search::{DisabledEmbedding, DocumentRecord, InMemoryCorpusSource};

    fn tool() -> ClassifyOccupationTool {
        let engine = HybridSearchEngine::new(
            Arc::new(InMemoryCorpusSource::new(vec![
                DocumentRecord::new("2512", "Systemvetare", "Arbetar med IT-system"),
                DocumentRecord::new("3313", "Ekonomiassistent", "Arbetar med bokföring"),
                DocumentRecord::new("5120", "Kock", "Lagar mat"),
            ])),
            Arc::new(DisabledEmbedding),
        );
        ClassifyOccupationTool::new(Arc::new(engine))
    }

    #[test]
    fn test_build_query() {
        assert_eq!(build_query("Kock", None), "Kock");
        assert_eq!(build_query("Kock", Some("  ")), "Kock");
        assert_eq!(build_query(" Kock ", Some("lagar mat")), "Kock lagar mat");
    }

    #[tokio::test]
    async fn test_returns_ranked_matches() {
        let call = ToolCall::new(
            "c1",
            "classify_occupation",
            serde_json::json!({"title": "Ekonom", "description": "bokföring och redovisning"}),
        );
        let result = tool().execute(call).await.unwrap();
        assert!(!result.is_error);

        let matches: Vec<serde_json::Value> = serde_json::from_str(&result.content).unwrap();
        assert_eq!(matches[0]["ssyk_code"], "3313");
        assert_eq!(matches[0]["title"], "Ekonomiassistent");
        assert!(matches[0]["score"].as_f64().unwrap() > 0.0);
    }

    #[tokio::test]
    async fn test_limit_argument() {
        let call = ToolCall::new(
            "c1",
            "classify_occupation",
            serde_json::json!({"title": "arbetar", "limit": 1}),
        );
        let result = tool().execute(call).await.unwrap();
        let matches: Vec<serde_json::Value> = serde_json::from_str(&result.content).unwrap();
        assert_eq!(matches.len(), 1);

        let call = ToolCall::new(
            "c2",
            "classify_occupation",
            serde_json::json!({"title": "arbetar", "limit": 0}),
        );
        assert!(tool().execute(call).await.unwrap().is_error);
    }

    #[tokio::test]
    async fn test_missing_title_is_error_result() {
        let call = ToolCall::new("c1", "classify_occupation", serde_json::json!({}));
        let result = tool().execute(call).await.unwrap();
        assert!(result.is_error);
        assert!(result.content.contains("title"));
    }

    #[tokio::test]
    async fn test_no_match_is_empty_array() {
        let call = ToolCall::new(
            "c1",
            "classify_occupation",
            serde_json::json!({"title": "astronaut"}),
        );
        let result = tool().execute(call).await.unwrap();
        assert!(!result.is_error);
        assert_eq!(result.content, "[]");
    }
}
