use crate::config::EmbeddingConfig;
use async_trait::async_trait;
use serde::Deserialize;
use ssyk_core::{SsykError, SsykResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Why a query embedding could not be obtained.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EmbeddingFailure {
    /// No provider is configured.
    #[error("embedding provider disabled")]
    Disabled,

    /// The request did not finish within the configured timeout.
    #[error("embedding request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection, DNS or TLS failure.
    #[error("embedding transport error: {0}")]
    Transport(String),

    /// The API answered with a non-success status (quota, auth, ...).
    #[error("embedding API returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        body: String,
    },

    /// The response could not be interpreted as an embedding.
    #[error("malformed embedding response: {0}")]
    Malformed(String),

    /// The embedding length does not match the corpus embeddings.
    #[error("embedding has {actual} dimensions, corpus has {expected}")]
    DimensionMismatch {
        /// Corpus dimension.
        expected: usize,
        /// Returned dimension.
        actual: usize,
    },
}

/// Coarse failure category, used to log each kind of outage once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// See [`EmbeddingFailure::Disabled`].
    Disabled,
    /// See [`EmbeddingFailure::Timeout`].
    Timeout,
    /// See [`EmbeddingFailure::Transport`].
    Transport,
    /// See [`EmbeddingFailure::Status`].
    Status,
    /// See [`EmbeddingFailure::Malformed`].
    Malformed,
    /// See [`EmbeddingFailure::DimensionMismatch`].
    DimensionMismatch,
}

impl EmbeddingFailure {
    /// The category this failure belongs to.
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Disabled => FailureClass::Disabled,
            Self::Timeout(_) => FailureClass::Timeout,
            Self::Transport(_) => FailureClass::Transport,
            Self::Status { .. } => FailureClass::Status,
            Self::Malformed(_) => FailureClass::Malformed,
            Self::DimensionMismatch { .. } => FailureClass::DimensionMismatch,
        }
    }
}

impl From<EmbeddingFailure> for SsykError {
    fn from(failure: EmbeddingFailure) -> Self {
        SsykError::Embedding(failure.to_string())
    }
}

/// Outcome of one connectivity probe run by [`EmbeddingProvider::diagnose`].
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    /// Short probe name ("dns", "http").
    pub probe: &'static str,
    /// Whether the probe succeeded.
    pub ok: bool,
    /// Human-readable detail.
    pub detail: String,
}

/// Source of query embeddings.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Compute the embedding vector for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingFailure>;

    /// Whether this provider can produce embeddings at all.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Check connectivity to the provider after a transport failure.
    async fn diagnose(&self) -> Vec<ProbeOutcome> {
        Vec::new()
    }
}

/// Provider used when no embedding credential is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledEmbedding;

#[async_trait]
impl EmbeddingProvider for DisabledEmbedding {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingFailure> {
        Err(EmbeddingFailure::Disabled)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Longest response body kept in [`EmbeddingFailure::Status`].
const MAX_ERROR_BODY: usize = 300;

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// OpenAI-compatible `/v1/embeddings` client.
pub struct OpenAiEmbedding {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl OpenAiEmbedding {
    /// Build a client with the configured connect and request timeouts.
    pub fn new(api_key: impl Into<String>, config: &EmbeddingConfig) -> SsykResult<Self> {
        let timeout = config.timeout()?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(config.connect_timeout()?)
            .build()
            .map_err(|e| SsykError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Model name sent with every request.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn classify(&self, err: &reqwest::Error) -> EmbeddingFailure {
        if err.is_timeout() {
            EmbeddingFailure::Timeout(self.timeout)
        } else if err.is_decode() {
            EmbeddingFailure::Malformed(err.to_string())
        } else {
            EmbeddingFailure::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingFailure> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(&e))?;

        let status = resp.status();
        if !status.is_success() {
            let mut body = resp.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(EmbeddingFailure::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbeddingResponse = resp.json().await.map_err(|e| self.classify(&e))?;
        let embedding = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingFailure::Malformed("response contained no data".into()))?;

        if embedding.is_empty() {
            return Err(EmbeddingFailure::Malformed("empty embedding vector".into()));
        }

        debug!(model = %self.model, dimension = embedding.len(), "Query embedded");
        Ok(embedding)
    }

    async fn diagnose(&self) -> Vec<ProbeOutcome> {
        let mut outcomes = Vec::with_capacity(2);
        let probe_timeout = Duration::from_secs(5);

        let host = reqwest::Url::parse(&self.base_url)
            .ok()
            .and_then(|u| u.host_str().map(|h| (h.to_string(), u.port_or_known_default())));
        match host {
            Some((host, port)) => {
                let lookup = tokio::time::timeout(
                    probe_timeout,
                    tokio::net::lookup_host((host.as_str(), port.unwrap_or(443))),
                )
                .await;
                let outcome = match lookup {
                    Ok(Ok(addrs)) => {
                        let mut ips: Vec<String> = addrs.map(|a| a.ip().to_string()).collect();
                        ips.sort();
                        ips.dedup();
                        ips.truncate(8);
                        ProbeOutcome {
                            probe: "dns",
                            ok: !ips.is_empty(),
                            detail: format!("{host} -> {ips:?}"),
                        }
                    }
                    Ok(Err(e)) => ProbeOutcome {
                        probe: "dns",
                        ok: false,
                        detail: format!("{host}: {e}"),
                    },
                    Err(_) => ProbeOutcome {
                        probe: "dns",
                        ok: false,
                        detail: format!("{host}: lookup timed out"),
                    },
                };
                outcomes.push(outcome);
            }
            None => outcomes.push(ProbeOutcome {
                probe: "dns",
                ok: false,
                detail: format!("cannot parse host from {}", self.base_url),
            }),
        }

        let probe = self
            .http
            .get(format!("{}/v1/models", self.base_url))
            .header("Accept", "application/json")
            .timeout(Duration::from_secs(10))
            .send()
            .await;
        outcomes.push(match probe {
            Ok(resp) => ProbeOutcome {
                probe: "http",
                ok: true,
                detail: format!(
                    "status={} content_type={}",
                    resp.status().as_u16(),
                    resp.headers()
                        .get(reqwest::header::CONTENT_TYPE)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("-")
                ),
            },
            Err(e) => ProbeOutcome {
                probe: "http",
                ok: false,
                detail: e.to_string(),
            },
        });

        outcomes
    }
}

/// Pick the provider for a configuration: OpenAI when a non-blank API key is
/// present, otherwise [`DisabledEmbedding`].
pub fn provider_from_config(config: &EmbeddingConfig) -> SsykResult<Arc<dyn EmbeddingProvider>> {
    match config.api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => {
            let provider = OpenAiEmbedding::new(key, config)?;
            info!(model = %provider.model(), "Semantic search enabled");
            Ok(Arc::new(provider))
        }
        _ => Ok(Arc::new(DisabledEmbedding)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> EmbeddingConfig {
        EmbeddingConfig {
            api_key: Some("sk-test".into()),
            base_url: server.uri(),
            timeout_secs: 2.0,
            connect_timeout_secs: 1.0,
            ..EmbeddingConfig::default()
        }
    }

    #[tokio::test]
    async fn test_disabled_provider() {
        let provider = DisabledEmbedding;
        assert!(!provider.is_enabled());
        let err = provider.embed("anything").await.unwrap_err();
        assert_eq!(err.class(), FailureClass::Disabled);
    }

    #[tokio::test]
    async fn test_openai_embed_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "text-embedding-3-small",
                "input": "systemutvecklare"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "object": "list",
                "data": [{"object": "embedding", "index": 0, "embedding": [0.1, 0.2, 0.3]}],
                "model": "text-embedding-3-small"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenAiEmbedding::new("sk-test", &config_for(&server)).unwrap();
        let v = provider.embed("systemutvecklare").await.unwrap();
        assert_eq!(v, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn test_openai_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let provider = OpenAiEmbedding::new("sk-test", &config_for(&server)).unwrap();
        let err = provider.embed("x").await.unwrap_err();
        match err {
            EmbeddingFailure::Status { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "quota exceeded");
            }
            other => panic!("unexpected failure: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_openai_malformed_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
            .mount(&server)
            .await;

        let provider = OpenAiEmbedding::new("sk-test", &config_for(&server)).unwrap();
        let err = provider.embed("x").await.unwrap_err();
        assert_eq!(err.class(), FailureClass::Malformed);
    }

    #[tokio::test]
    async fn test_openai_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"data": [{"embedding": [1.0]}]}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let config = EmbeddingConfig {
            timeout_secs: 0.2,
            ..config_for(&server)
        };
        let provider = OpenAiEmbedding::new("sk-test", &config).unwrap();
        let err = provider.embed("x").await.unwrap_err();
        assert_eq!(err.class(), FailureClass::Timeout);
    }

    #[tokio::test]
    async fn test_openai_transport_error() {
        let config = EmbeddingConfig {
            api_key: Some("sk-test".into()),
            base_url: "http://127.0.0.1:1".into(),
            ..EmbeddingConfig::default()
        };
        let provider = OpenAiEmbedding::new("sk-test", &config).unwrap();
        let err = provider.embed("x").await.unwrap_err();
        assert_eq!(err.class(), FailureClass::Transport);
    }

    #[tokio::test]
    async fn test_diagnose_reports_http_probe() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let provider = OpenAiEmbedding::new("sk-test", &config_for(&server)).unwrap();
        let outcomes = provider.diagnose().await;
        let http = outcomes.iter().find(|o| o.probe == "http").unwrap();
        assert!(http.ok);
        assert!(http.detail.contains("status=401"));
    }

    #[test]
    fn test_provider_from_config() {
        let disabled = provider_from_config(&EmbeddingConfig::default()).unwrap();
        assert!(!disabled.is_enabled());

        let blank = EmbeddingConfig {
            api_key: Some("   ".into()),
            ..EmbeddingConfig::default()
        };
        assert!(!provider_from_config(&blank).unwrap().is_enabled());

        let enabled = EmbeddingConfig {
            api_key: Some("sk-live".into()),
            ..EmbeddingConfig::default()
        };
        assert!(provider_from_config(&enabled).unwrap().is_enabled());
    }
}
