use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use ssyk_core::SsykResult;
use tracing::{debug, info, warn};

use crate::bm25::{Bm25Index, Bm25Params};
use crate::config::SearchConfig;
use crate::corpus::{Corpus, CorpusError, CorpusSource, Document, FileCorpusSource};
use crate::embedding::{provider_from_config, EmbeddingFailure, EmbeddingProvider, FailureClass};
use crate::fusion::{fuse, rank, FusionWeights};
use crate::similarity::EmbeddingMatrix;
use crate::tokenizer::tokenize;

/// Lifecycle of the engine's corpus snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    /// Nothing loaded yet.
    Unloaded,
    /// A load is in flight.
    Loading,
    /// A snapshot is available for queries.
    Ready,
    /// The last load failed and no snapshot is available; the next search retries.
    Failed,
}

/// One ranked occupation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    /// SSYK code, serialized as `ssyk_code`.
    #[serde(rename = "ssyk_code")]
    pub code: String,
    /// Occupation title.
    pub title: String,
    /// Task description.
    pub description: String,
    /// Fused score; comparable only within one result list.
    pub score: f32,
}

/// Things worth logging once per engine rather than on every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Notice {
    SemanticDisabled,
    CorpusWithoutEmbeddings,
    LoadFailed(&'static str),
    Provider(FailureClass),
}

/// Corpus and lexical index, built together and never mutated.
struct Snapshot {
    corpus: Corpus,
    index: Bm25Index,
}

/// Hybrid lexical + semantic search over the SSYK taxonomy.
///
/// The corpus is loaded lazily on the first search (or by [`warmup`]) and
/// kept as an immutable snapshot. Semantic scoring is attempted per query and
/// any provider failure falls back to lexical-only ranking for that query.
///
/// [`warmup`]: HybridSearchEngine::warmup
pub struct HybridSearchEngine {
    source: Arc<dyn CorpusSource>,
    embedder: Arc<dyn EmbeddingProvider>,
    fusion: FusionWeights,
    bm25: Bm25Params,
    embed_timeout: Duration,
    default_limit: usize,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    state: Mutex<EngineState>,
    /// Serializes loads so concurrent first queries trigger one build.
    load_lock: tokio::sync::Mutex<()>,
    notices: Mutex<HashSet<Notice>>,
}

impl HybridSearchEngine {
    /// Create an engine with default fusion weights, BM25 parameters and a
    /// 30 second embedding timeout.
    pub fn new(source: Arc<dyn CorpusSource>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            source,
            embedder,
            fusion: FusionWeights::default(),
            bm25: Bm25Params::default(),
            embed_timeout: Duration::from_secs(30),
            default_limit: 5,
            snapshot: RwLock::new(None),
            state: Mutex::new(EngineState::Unloaded),
            load_lock: tokio::sync::Mutex::new(()),
            notices: Mutex::new(HashSet::new()),
        }
    }

    /// Build an engine reading the corpus file and embedding settings from `config`.
    pub fn from_config(config: &SearchConfig) -> SsykResult<Self> {
        let source = Arc::new(FileCorpusSource::new(config.corpus_path.clone()));
        let embedder = provider_from_config(&config.embedding)?;
        Ok(Self::new(source, embedder)
            .with_fusion(config.fusion)
            .with_bm25(config.bm25)
            .with_embed_timeout(config.embedding.timeout()?)
            .with_default_limit(config.default_limit))
    }

    /// Set the fusion weights. Chainable builder method.
    pub fn with_fusion(mut self, fusion: FusionWeights) -> Self {
        self.fusion = fusion;
        self
    }

    /// Set the BM25 parameters used by future loads.
    pub fn with_bm25(mut self, bm25: Bm25Params) -> Self {
        self.bm25 = bm25;
        self
    }

    /// Upper bound on one query embedding call.
    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    /// Result count used by callers that do not ask for one. Clamped to at least 1.
    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit.max(1);
        self
    }

    /// Result count used when a caller does not ask for one.
    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        *self.state.lock()
    }

    /// Number of documents in the current snapshot (0 when not loaded).
    pub fn len(&self) -> usize {
        self.current().map_or(0, |s| s.corpus.len())
    }

    /// Whether no documents are loaded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a query would currently attempt semantic scoring.
    pub fn semantic_available(&self) -> bool {
        self.embedder.is_enabled()
            && self
                .current()
                .is_some_and(|s| s.corpus.embeddings().is_some())
    }

    /// Look up a loaded document by SSYK code.
    pub fn document(&self, code: &str) -> Option<Document> {
        self.current()?.corpus.find(code).cloned()
    }

    /// Load the corpus now instead of on the first search.
    ///
    /// Returns whether the engine is ready afterwards.
    pub async fn warmup(&self) -> bool {
        self.ensure_loaded().await.is_some()
    }

    /// Rebuild the snapshot from the source and swap it in.
    ///
    /// On failure the previous snapshot, if any, stays in service.
    pub async fn reload(&self) -> SsykResult<usize> {
        let _guard = self.load_lock.lock().await;
        let snapshot = self.load_locked().await?;
        Ok(snapshot.corpus.len())
    }

    /// Rank the corpus against `query` and return at most `n` results.
    ///
    /// Never fails: a blank query, `n == 0`, or an unloadable corpus yields an
    /// empty list, and semantic failures degrade to lexical ranking.
    pub async fn search(&self, query: &str, n: usize) -> Vec<ScoredResult> {
        let query = query.trim();
        if query.is_empty() || n == 0 {
            return Vec::new();
        }

        let Some(snapshot) = self.ensure_loaded().await else {
            return Vec::new();
        };

        let lexical = snapshot.index.scores(&tokenize(query));
        let semantic = self.semantic_scores(&snapshot, query).await;
        let fused = fuse(&lexical, semantic.as_deref(), self.fusion);

        let results: Vec<ScoredResult> = rank(&fused, n)
            .into_iter()
            .filter_map(|(index, score)| {
                snapshot.corpus.get(index).map(|doc| ScoredResult {
                    code: doc.code.clone(),
                    title: doc.title.clone(),
                    description: doc.description.clone(),
                    score,
                })
            })
            .collect();

        debug!(
            query = %query,
            semantic = semantic.is_some(),
            results = results.len(),
            "Search completed"
        );
        results
    }

    fn current(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.read().clone()
    }

    async fn ensure_loaded(&self) -> Option<Arc<Snapshot>> {
        if let Some(snapshot) = self.current() {
            return Some(snapshot);
        }

        let _guard = self.load_lock.lock().await;
        // Another caller may have finished loading while we waited.
        if let Some(snapshot) = self.current() {
            return Some(snapshot);
        }
        self.load_locked().await.ok()
    }

    /// Build a new snapshot and publish it. Caller must hold `load_lock`.
    async fn load_locked(&self) -> Result<Arc<Snapshot>, CorpusError> {
        let in_flight = LoadInFlight::start(self);
        info!(source = %self.source.describe(), "Loading SSYK corpus");

        match self.build_snapshot().await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                *self.snapshot.write() = Some(Arc::clone(&snapshot));
                in_flight.finish(EngineState::Ready);
                info!(
                    documents = snapshot.corpus.len(),
                    vocabulary = snapshot.index.vocabulary_size(),
                    embedding_dimension = snapshot.corpus.embeddings().map(EmbeddingMatrix::dimension),
                    "Search engine initialized"
                );
                Ok(snapshot)
            }
            Err(e) => {
                let fallback = if self.current().is_some() {
                    EngineState::Ready
                } else {
                    EngineState::Failed
                };
                in_flight.finish(fallback);
                if self.first_time(Notice::LoadFailed(e.kind())) {
                    warn!(source = %self.source.describe(), kind = e.kind(), error = %e, "Failed to load SSYK corpus");
                } else {
                    debug!(source = %self.source.describe(), kind = e.kind(), error = %e, "Failed to load SSYK corpus");
                }
                Err(e)
            }
        }
    }

    async fn build_snapshot(&self) -> Result<Snapshot, CorpusError> {
        let records = self.source.load().await?;
        let corpus = Corpus::from_records(records)?;
        if corpus.is_empty() {
            warn!(source = %self.source.describe(), "SSYK corpus is empty");
        }
        let index = Bm25Index::build(&corpus.tokenized(), self.bm25);
        Ok(Snapshot { corpus, index })
    }

    /// Semantic scores for this query, or `None` to rank lexically.
    async fn semantic_scores(&self, snapshot: &Snapshot, query: &str) -> Option<Vec<Option<f32>>> {
        if !self.embedder.is_enabled() {
            if self.first_time(Notice::SemanticDisabled) {
                warn!("Vector search disabled (no embedding API key); falling back to BM25-only search");
            }
            return None;
        }

        let Some(matrix) = snapshot.corpus.embeddings() else {
            if self.first_time(Notice::CorpusWithoutEmbeddings) {
                warn!("Corpus has no embeddings; falling back to BM25-only search");
            }
            return None;
        };

        let embedded = tokio::time::timeout(self.embed_timeout, self.embedder.embed(query))
            .await
            .unwrap_or(Err(EmbeddingFailure::Timeout(self.embed_timeout)));

        match embedded.and_then(|vector| matrix.cosine_scores(&vector)) {
            Ok(scores) => Some(scores),
            Err(failure) => {
                self.report_failure(&failure);
                None
            }
        }
    }

    fn report_failure(&self, failure: &EmbeddingFailure) {
        let class = failure.class();
        if !self.first_time(Notice::Provider(class)) {
            debug!(class = ?class, error = %failure, "Vector search failed");
            return;
        }

        warn!(class = ?class, error = %failure, "Vector search failed; falling back to BM25-only search");

        if class == FailureClass::Transport {
            let embedder = Arc::clone(&self.embedder);
            tokio::spawn(async move {
                for outcome in embedder.diagnose().await {
                    if outcome.ok {
                        info!(probe = outcome.probe, detail = %outcome.detail, "Embedding provider probe ok");
                    } else {
                        warn!(probe = outcome.probe, detail = %outcome.detail, "Embedding provider probe failed");
                    }
                }
            });
        }
    }

    /// Records a notice; true only the first time it is seen.
    fn first_time(&self, notice: Notice) -> bool {
        self.notices.lock().insert(notice)
    }
}

/// Marks the engine `Loading` while a build runs.
///
/// If the load future is dropped before [`finish`](LoadInFlight::finish),
/// the state falls back to `Ready` when an older snapshot is still in service
/// and `Unloaded` otherwise.
struct LoadInFlight<'a> {
    engine: &'a HybridSearchEngine,
    settled: bool,
}

impl<'a> LoadInFlight<'a> {
    fn start(engine: &'a HybridSearchEngine) -> Self {
        *engine.state.lock() = EngineState::Loading;
        Self {
            engine,
            settled: false,
        }
    }

    fn finish(mut self, state: EngineState) {
        *self.engine.state.lock() = state;
        self.settled = true;
    }
}

impl Drop for LoadInFlight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let state = if self.engine.current().is_some() {
            EngineState::Ready
        } else {
            EngineState::Unloaded
        };
        *self.engine.state.lock() = state;
        debug!(state = ?state, "Corpus load cancelled");
    }
}
