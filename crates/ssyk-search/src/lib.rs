//! Hybrid lexical + semantic search over the SSYK occupation taxonomy.
//!
//! Ranks occupations for a free-text query by fusing BM25 relevance over
//! titles and descriptions with cosine similarity against precomputed
//! embeddings, and degrades to lexical-only ranking whenever the semantic
//! signal is unavailable.
//!
//! # Main types
//!
//! - [`HybridSearchEngine`]: Lazily loaded search engine; the public entry point.
//! - [`Bm25Index`]: Dense BM25 scorer over the tokenized corpus.
//! - [`EmbeddingMatrix`]: Row-major document embeddings with cosine scoring.
//! - [`EmbeddingProvider`]: Trait for query embedding backends.
//! - [`CorpusSource`]: Trait for loading occupation records.
//! - [`SearchConfig`]: Serde-backed engine configuration.

/// BM25 lexical index.
pub mod bm25;
/// Search and embedding configuration.
pub mod config;
/// Occupation records, the loaded corpus and corpus sources.
pub mod corpus;
/// Query embedding providers.
pub mod embedding;
/// The hybrid search engine.
pub mod engine;
/// Score normalization, fusion and ranking.
pub mod fusion;
/// Cosine similarity and the embedding matrix.
pub mod similarity;
/// Lexical tokenization.
pub mod tokenizer;

pub use bm25::{Bm25Index, Bm25Params};
pub use config::{EmbeddingConfig, SearchConfig};
pub use corpus::{
    Corpus, CorpusError, CorpusSource, Document, DocumentRecord, FileCorpusSource,
    InMemoryCorpusSource,
};
pub use embedding::{
    provider_from_config, DisabledEmbedding, EmbeddingFailure, EmbeddingProvider, FailureClass,
    OpenAiEmbedding, ProbeOutcome,
};
pub use engine::{EngineState, HybridSearchEngine, ScoredResult};
pub use fusion::{fuse, min_max_normalize, rank, FusionWeights};
pub use similarity::{cosine_similarity, EmbeddingMatrix};
pub use tokenizer::tokenize;
