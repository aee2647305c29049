use crate::bm25::Bm25Params;
use crate::fusion::FusionWeights;
use serde::{Deserialize, Serialize};
use ssyk_core::{SsykError, SsykResult};
use std::path::PathBuf;
use std::time::Duration;

/// Settings for the hybrid search engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Location of the occupation corpus table.
    #[serde(default = "default_corpus_path")]
    pub corpus_path: PathBuf,
    /// Number of results returned when the caller does not ask for a count.
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    /// Lexical and semantic weights, `[search.fusion]`.
    #[serde(default)]
    pub fusion: FusionWeights,
    /// BM25 `k1` and `b`, `[search.bm25]`.
    #[serde(default)]
    pub bm25: Bm25Params,
    /// Query embedding provider, `[search.embedding]`.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

fn default_corpus_path() -> PathBuf {
    PathBuf::from("./data/processed/ssyk_data.jsonl")
}

fn default_limit() -> usize {
    5
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            corpus_path: default_corpus_path(),
            default_limit: default_limit(),
            fusion: FusionWeights::default(),
            bm25: Bm25Params::default(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

/// Settings for the query embedding provider.
///
/// Semantic search is enabled only when `api_key` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Bearer token; never serialized.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Embedding model name.
    #[serde(default = "default_model")]
    pub model: String,
    /// API root; `/v1/embeddings` is appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Total request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,
    /// TCP connect timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: f64,
}

fn default_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_timeout_secs() -> f64 {
    30.0
}

fn default_connect_timeout_secs() -> f64 {
    10.0
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    /// Total request timeout; rejects negative or non-finite values.
    pub fn timeout(&self) -> SsykResult<Duration> {
        seconds("timeout_secs", self.timeout_secs)
    }

    /// Connect timeout, validated like [`timeout`](Self::timeout).
    pub fn connect_timeout(&self) -> SsykResult<Duration> {
        seconds("connect_timeout_secs", self.connect_timeout_secs)
    }

    /// Whether a non-blank API key is configured.
    pub fn has_credential(&self) -> bool {
        self.api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }
}

fn seconds(field: &str, value: f64) -> SsykResult<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| SsykError::Config(format!("invalid embedding.{field} {value}: {e}")))
}
