use crate::tool::{Tool, ToolDescriptor};
use async_trait::async_trait;
use serde_json::{Map, Value};
use ssyk_core::{SsykError, SsykResult, ToolCall, ToolResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Outcome of an income statistics lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomeLookup {
    /// Metric name to value, as stored in the statistics file.
    Found(Map<String, Value>),
    /// No statistics for the code, or the file is unavailable.
    NotFound,
}

/// Lazily loaded, read-only income statistics keyed by SSYK code.
///
/// The file is read on first use. A failed read leaves the cache empty and
/// is retried on the next lookup; concurrent first lookups share one read.
pub struct IncomeStatsCache {
    path: PathBuf,
    stats: OnceCell<HashMap<String, Value>>,
    unavailable_reported: AtomicBool,
}

impl IncomeStatsCache {
    /// Cache over the JSON file at `path`; nothing is read yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            stats: OnceCell::new(),
            unavailable_reported: AtomicBool::new(false),
        }
    }

    /// The statistics file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file has been read successfully.
    pub fn is_loaded(&self) -> bool {
        self.stats.initialized()
    }

    /// Number of occupations with statistics (0 until loaded).
    pub fn len(&self) -> usize {
        self.stats.get().map_or(0, HashMap::len)
    }

    /// Whether no statistics are loaded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load the file now. Returns the number of occupations.
    pub async fn load(&self) -> SsykResult<usize> {
        let stats = self
            .stats
            .get_or_try_init(|| read_stats(&self.path))
            .await?;
        Ok(stats.len())
    }

    /// Statistics for `code`. An unreadable file counts as no data.
    pub async fn lookup(&self, code: &str) -> IncomeLookup {
        if let Err(e) = self.load().await {
            if self.first_unavailable() {
                warn!(path = %self.path.display(), error = %e, "Income statistics unavailable");
            } else {
                debug!(path = %self.path.display(), error = %e, "Income statistics unavailable");
            }
            return IncomeLookup::NotFound;
        }

        match self.stats.get().and_then(|stats| stats.get(code.trim())) {
            Some(Value::Object(metrics)) if !metrics.is_empty() => {
                IncomeLookup::Found(metrics.clone())
            }
            _ => IncomeLookup::NotFound,
        }
    }

    /// True only for the first failed read.
    fn first_unavailable(&self) -> bool {
        !self.unavailable_reported.swap(true, Ordering::Relaxed)
    }
}

async fn read_stats(path: &Path) -> SsykResult<HashMap<String, Value>> {
    let data = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            SsykError::Config(format!("income statistics file not found: {}", path.display()))
        } else {
            SsykError::Io(e)
        }
    })?;
    let stats: HashMap<String, Value> = serde_json::from_str(&data)?;
    info!(path = %path.display(), occupations = stats.len(), "Loaded income statistics");
    Ok(stats)
}

/// Tool that returns income statistics for one SSYK code.
pub struct GetIncomeStatisticsTool {
    descriptor: ToolDescriptor,
    cache: Arc<IncomeStatsCache>,
}

impl GetIncomeStatisticsTool {
    /// Serve lookups from `cache`.
    pub fn new(cache: Arc<IncomeStatsCache>) -> Self {
        Self {
            descriptor: ToolDescriptor {
                name: "get_income_statistics".to_string(),
                description: "Fetches income statistics (mean, median and percentiles) for a \
                              given SSYK code from Statistics Sweden (SCB)."
                    .to_string(),
                parameters_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "ssyk_code": {
                            "type": "string",
                            "description": "The 4-digit SSYK code (e.g. \"2512\")"
                        }
                    },
                    "required": ["ssyk_code"]
                }),
            },
            cache,
        }
    }
}

#[async_trait]
impl Tool for GetIncomeStatisticsTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, call: ToolCall) -> SsykResult<ToolResult> {
        let code = match call.arguments.get("ssyk_code") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Ok(ToolResult::error(
                    &call.id,
                    "Missing required argument: ssyk_code",
                ))
            }
        };

        let body = match self.cache.lookup(&code).await {
            IncomeLookup::Found(metrics) => {
                let mut body = Map::new();
                body.insert("ssyk_code".to_string(), Value::String(code));
                body.extend(metrics);
                Value::Object(body)
            }
            IncomeLookup::NotFound => serde_json::json!({
                "error": format!("No income data found for SSYK code {code}")
            }),
        };

        Ok(ToolResult::json(&call.id, &body))
    }
}
