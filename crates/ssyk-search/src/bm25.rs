use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// BM25 tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    /// Term-frequency saturation.
    #[serde(default = "default_k1")]
    pub k1: f32,
    /// Length normalization strength (0 = none, 1 = full).
    #[serde(default = "default_b")]
    pub b: f32,
}

fn default_k1() -> f32 {
    1.5
}

fn default_b() -> f32 {
    0.75
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: default_k1(),
            b: default_b(),
        }
    }
}

/// A BM25 index over a fixed, ordered corpus.
///
/// Documents are addressed by their position in the corpus, and
/// [`Bm25Index::scores`] returns one score per document in that same order,
/// so the output can be zipped with any other per-document vector.
#[derive(Debug, Clone)]
pub struct Bm25Index {
    /// term -> [(doc_index, term_frequency)]
    postings: HashMap<String, Vec<(usize, f32)>>,
    /// doc_index -> document length (token count)
    doc_lengths: Vec<f32>,
    /// Average document length across the corpus.
    avg_doc_length: f32,
    params: Bm25Params,
}

impl Bm25Index {
    /// Build an index from one token sequence per document, in corpus order.
    ///
    /// Empty token sequences are allowed; they have length zero and never match.
    pub fn build(documents: &[Vec<String>], params: Bm25Params) -> Self {
        let mut postings: HashMap<String, Vec<(usize, f32)>> = HashMap::new();
        let mut doc_lengths = Vec::with_capacity(documents.len());

        for (doc_index, tokens) in documents.iter().enumerate() {
            doc_lengths.push(tokens.len() as f32);

            let mut term_freq: HashMap<&str, f32> = HashMap::new();
            for token in tokens {
                *term_freq.entry(token.as_str()).or_insert(0.0) += 1.0;
            }
            for (term, freq) in term_freq {
                postings
                    .entry(term.to_string())
                    .or_default()
                    .push((doc_index, freq));
            }
        }

        let avg_doc_length = if doc_lengths.is_empty() {
            0.0
        } else {
            doc_lengths.iter().sum::<f32>() / doc_lengths.len() as f32
        };

        Self {
            postings,
            doc_lengths,
            avg_doc_length,
            params,
        }
    }

    /// Score every document against a tokenized query.
    ///
    /// ```text
    /// score = sum over query terms of:
    ///   IDF(t) * (tf * (k1 + 1)) / (tf + k1 * (1 - b + b * dl / avgdl))
    /// ```
    /// with `IDF(t) = ln((N - df + 0.5) / (df + 0.5) + 1.0)`.
    ///
    /// The result always has one entry per document. Unknown terms and an
    /// empty query contribute nothing.
    pub fn scores(&self, query_tokens: &[String]) -> Vec<f32> {
        let mut scores = vec![0.0f32; self.doc_lengths.len()];
        if query_tokens.is_empty() || scores.is_empty() {
            return scores;
        }

        let n = self.doc_lengths.len() as f32;
        let avgdl = if self.avg_doc_length > 0.0 {
            self.avg_doc_length
        } else {
            1.0
        };
        let Bm25Params { k1, b } = self.params;

        for token in query_tokens {
            let Some(postings) = self.postings.get(token) else {
                continue;
            };
            let df = postings.len() as f32;
            // Robertson's IDF with +1, never negative
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

            for &(doc_index, tf) in postings {
                let dl = self.doc_lengths[doc_index];
                let numerator = tf * (k1 + 1.0);
                let denominator = tf + k1 * (1.0 - b + b * dl / avgdl);
                scores[doc_index] += idf * numerator / denominator;
            }
        }

        scores
    }

    /// Number of documents in the index.
    pub fn document_count(&self) -> usize {
        self.doc_lengths.len()
    }

    /// Number of distinct terms in the index.
    pub fn vocabulary_size(&self) -> usize {
        self.postings.len()
    }

    /// Average document length in tokens.
    pub fn avg_doc_length(&self) -> f32 {
        self.avg_doc_length
    }
}
