//! The occupation corpus: documents in load order plus their embedding matrix.

use crate::similarity::EmbeddingMatrix;
use crate::tokenizer::tokenize;
use async_trait::async_trait;
use serde::Deserialize;
use ssyk_core::SsykError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Why a corpus could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    /// The corpus file does not exist.
    #[error("corpus file not found at {0}")]
    NotFound(PathBuf),

    /// The corpus file exists but could not be read.
    #[error("failed to read corpus {path}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The data is structurally invalid (missing columns, ragged embeddings, ...).
    #[error("malformed corpus: {0}")]
    Malformed(String),
}

impl CorpusError {
    /// Short name of the failure kind, stable across messages.
    pub fn kind(&self) -> &'static str {
        match self {
            CorpusError::NotFound(_) => "not_found",
            CorpusError::Read { .. } => "read",
            CorpusError::Malformed(_) => "malformed",
        }
    }
}

impl From<CorpusError> for SsykError {
    fn from(err: CorpusError) -> Self {
        SsykError::Corpus(err.to_string())
    }
}

/// One raw taxonomy row as read from a corpus source.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    /// SSYK code.
    pub code: String,
    /// Occupation title.
    pub title: String,
    /// Task description; may be empty.
    pub description: String,
    /// Explicit lexical text; derived from title and description when absent.
    pub search_text: Option<String>,
    /// Precomputed document embedding.
    pub embedding: Option<Vec<f32>>,
}

impl DocumentRecord {
    /// A record without search text or embedding.
    pub fn new(
        code: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            title: title.into(),
            description: description.into(),
            search_text: None,
            embedding: None,
        }
    }

    /// Attach a precomputed embedding.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Override the text used for lexical matching.
    pub fn with_search_text(mut self, search_text: impl Into<String>) -> Self {
        self.search_text = Some(search_text.into());
        self
    }
}

/// One occupation in the loaded corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// SSYK code, trimmed.
    pub code: String,
    /// Occupation title.
    pub title: String,
    /// Task description; may be empty.
    pub description: String,
    /// Text tokenized for the lexical index.
    pub search_text: String,
}

/// Ordered, immutable set of documents.
///
/// The position of a document is its identity for scoring: lexical and
/// semantic score vectors are indexed the same way.
#[derive(Debug, Clone)]
pub struct Corpus {
    documents: Vec<Document>,
    by_code: HashMap<String, usize>,
    embeddings: Option<EmbeddingMatrix>,
}

impl Corpus {
    /// Validate raw records and build the corpus in record order.
    pub fn from_records(records: Vec<DocumentRecord>) -> Result<Self, CorpusError> {
        let mut documents = Vec::with_capacity(records.len());
        let mut by_code = HashMap::with_capacity(records.len());
        let mut rows = Vec::with_capacity(records.len());

        for (index, record) in records.into_iter().enumerate() {
            let code = record.code.trim().to_string();
            if code.is_empty() {
                return Err(CorpusError::Malformed(format!(
                    "row {index} has an empty code"
                )));
            }
            if by_code.insert(code.clone(), index).is_some() {
                return Err(CorpusError::Malformed(format!("duplicate code {code}")));
            }

            let search_text = match record.search_text {
                Some(text) if !text.trim().is_empty() => text,
                _ if record.description.trim().is_empty() => record.title.clone(),
                _ => format!("{}: {}", record.title, record.description),
            };

            rows.push(record.embedding);
            documents.push(Document {
                code,
                title: record.title,
                description: record.description,
                search_text,
            });
        }

        let embeddings = EmbeddingMatrix::from_rows(&rows).map_err(|index| {
            CorpusError::Malformed(format!(
                "embedding for code {} has {} dimensions, expected {}",
                documents[index].code,
                rows[index].as_ref().map_or(0, Vec::len),
                rows.iter().flatten().map(Vec::len).next().unwrap_or(0),
            ))
        })?;

        if let Some(matrix) = &embeddings {
            let missing = matrix.rows() - matrix.present_rows();
            if missing > 0 {
                warn!(
                    missing,
                    total = matrix.rows(),
                    "Some documents lack embeddings; they are ranked on lexical score only"
                );
            }
        }

        Ok(Self {
            documents,
            by_code,
            embeddings,
        })
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the corpus has no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// All documents in corpus order.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Document at a score-vector index.
    pub fn get(&self, index: usize) -> Option<&Document> {
        self.documents.get(index)
    }

    /// Look a document up by its SSYK code.
    pub fn find(&self, code: &str) -> Option<&Document> {
        self.by_code
            .get(code.trim())
            .and_then(|&index| self.documents.get(index))
    }

    /// Embedding matrix, if any document carries an embedding.
    pub fn embeddings(&self) -> Option<&EmbeddingMatrix> {
        self.embeddings.as_ref()
    }

    /// Token sequences for the lexical index, in corpus order.
    pub fn tokenized(&self) -> Vec<Vec<String>> {
        self.documents
            .iter()
            .map(|doc| tokenize(&doc.search_text))
            .collect()
    }
}

/// Where corpus records come from.
#[async_trait]
pub trait CorpusSource: Send + Sync {
    /// Read all records, in their stored order.
    async fn load(&self) -> Result<Vec<DocumentRecord>, CorpusError>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// Fixed records held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCorpusSource {
    records: Vec<DocumentRecord>,
}

impl InMemoryCorpusSource {
    /// Serve `records` on every load.
    pub fn new(records: Vec<DocumentRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl CorpusSource for InMemoryCorpusSource {
    async fn load(&self) -> Result<Vec<DocumentRecord>, CorpusError> {
        Ok(self.records.clone())
    }

    fn describe(&self) -> String {
        format!("in-memory ({} records)", self.records.len())
    }
}

/// Corpus stored on disk as JSON.
///
/// Files ending in `.jsonl` / `.ndjson` hold one row object per line; any
/// other file is a columnar table: an object mapping each column name to an
/// array of values, all arrays the same length.
#[derive(Debug, Clone)]
pub struct FileCorpusSource {
    path: PathBuf,
}

impl FileCorpusSource {
    /// Read the corpus from `path` on each load.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The corpus file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_row_format(&self) -> bool {
        matches!(
            self.path.extension().and_then(|e| e.to_str()),
            Some("jsonl" | "ndjson")
        )
    }
}

#[async_trait]
impl CorpusSource for FileCorpusSource {
    async fn load(&self) -> Result<Vec<DocumentRecord>, CorpusError> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CorpusError::NotFound(self.path.clone()))
            }
            Err(source) => {
                return Err(CorpusError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let records = if self.is_row_format() {
            parse_rows(&data)?
        } else {
            parse_columns(&data)?
        };
        debug!(path = %self.path.display(), records = records.len(), "Corpus file parsed");
        Ok(records)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Codes are strings in the taxonomy export but may arrive as numbers.
fn code_to_string(value: &serde_json::Value, at: &str) -> Result<String, CorpusError> {
    match value {
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(CorpusError::Malformed(format!(
            "{at}: code must be a string or number, got {other}"
        ))),
    }
}

#[derive(Deserialize)]
struct Row {
    #[serde(alias = "code")]
    ssyk_code: Option<serde_json::Value>,
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    search_text: Option<String>,
    #[serde(default)]
    embedding: Option<Vec<f32>>,
}

fn parse_rows(data: &str) -> Result<Vec<DocumentRecord>, CorpusError> {
    let mut records = Vec::new();
    for (line_no, line) in data.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let at = format!("line {}", line_no + 1);
        let row: Row = serde_json::from_str(line)
            .map_err(|e| CorpusError::Malformed(format!("{at}: {e}")))?;
        let code = row
            .ssyk_code
            .as_ref()
            .ok_or_else(|| CorpusError::Malformed(format!("{at}: missing ssyk_code")))
            .and_then(|v| code_to_string(v, &at))?;
        let title = row
            .title
            .ok_or_else(|| CorpusError::Malformed(format!("{at}: missing title")))?;

        records.push(DocumentRecord {
            code,
            title,
            description: row.description.unwrap_or_default(),
            search_text: row.search_text,
            embedding: row.embedding,
        });
    }
    Ok(records)
}

#[derive(Deserialize)]
struct Columns {
    #[serde(alias = "code")]
    ssyk_code: Option<Vec<serde_json::Value>>,
    title: Option<Vec<Option<String>>>,
    #[serde(default)]
    description: Option<Vec<Option<String>>>,
    #[serde(default)]
    search_text: Option<Vec<Option<String>>>,
    #[serde(default)]
    embedding: Option<Vec<Option<Vec<f32>>>>,
}

fn parse_columns(data: &str) -> Result<Vec<DocumentRecord>, CorpusError> {
    let table: Columns =
        serde_json::from_str(data).map_err(|e| CorpusError::Malformed(e.to_string()))?;

    let missing: Vec<&str> = [
        ("ssyk_code", table.ssyk_code.is_none()),
        ("title", table.title.is_none()),
    ]
    .into_iter()
    .filter_map(|(name, absent)| absent.then_some(name))
    .collect();
    if !missing.is_empty() {
        return Err(CorpusError::Malformed(format!(
            "missing required columns: {}",
            missing.join(", ")
        )));
    }

    let codes = table.ssyk_code.unwrap_or_default();
    let titles = table.title.unwrap_or_default();
    let n = codes.len();

    let lengths = [
        ("title", Some(titles.len())),
        ("description", table.description.as_ref().map(Vec::len)),
        ("search_text", table.search_text.as_ref().map(Vec::len)),
        ("embedding", table.embedding.as_ref().map(Vec::len)),
    ];
    for (name, len) in lengths {
        if let Some(len) = len.filter(|len| *len != n) {
            return Err(CorpusError::Malformed(format!(
                "column {name} has {len} values, ssyk_code has {n}"
            )));
        }
    }

    let mut descriptions = table.description.map(Vec::into_iter);
    let mut search_texts = table.search_text.map(Vec::into_iter);
    let mut embeddings = table.embedding.map(Vec::into_iter);
    let mut records = Vec::with_capacity(n);
    for (index, (code, title)) in codes.iter().zip(titles).enumerate() {
        records.push(DocumentRecord {
            code: code_to_string(code, &format!("row {index}"))?,
            title: title.unwrap_or_default(),
            description: descriptions
                .as_mut()
                .and_then(Iterator::next)
                .flatten()
                .unwrap_or_default(),
            search_text: search_texts.as_mut().and_then(Iterator::next).flatten(),
            embedding: embeddings.as_mut().and_then(Iterator::next).flatten(),
        });
    }
    Ok(records)
}
