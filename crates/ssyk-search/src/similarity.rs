//! Cosine similarity between a query vector and a matrix of document vectors.

use crate::embedding::EmbeddingFailure;

/// Cosine similarity of two equal-length vectors.
///
/// Returns `0.0` when either vector has zero norm or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let na = l2_norm(a);
    let nb = l2_norm(b);
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot(a, b) / (na * nb)
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Row-major matrix of document embeddings in corpus order.
///
/// Rows may be absent (a document without an embedding); absent rows score
/// `None`. Row norms are computed once at construction.
#[derive(Debug, Clone)]
pub struct EmbeddingMatrix {
    dimension: usize,
    data: Vec<f32>,
    present: Vec<bool>,
    norms: Vec<f32>,
}

impl EmbeddingMatrix {
    /// Build a matrix from optional rows.
    ///
    /// Returns `None` if no row is present. Every present row must have the
    /// same, non-zero length; the first offending row index is returned
    /// otherwise.
    pub fn from_rows(rows: &[Option<Vec<f32>>]) -> Result<Option<Self>, usize> {
        let Some((first, dimension)) = rows
            .iter()
            .enumerate()
            .find_map(|(index, row)| row.as_ref().map(|values| (index, values.len())))
        else {
            return Ok(None);
        };
        if dimension == 0 {
            return Err(first);
        }

        let mut data = Vec::with_capacity(rows.len() * dimension);
        let mut present = Vec::with_capacity(rows.len());
        let mut norms = Vec::with_capacity(rows.len());

        for (index, row) in rows.iter().enumerate() {
            match row {
                Some(values) if values.len() == dimension => {
                    data.extend_from_slice(values);
                    present.push(true);
                    norms.push(l2_norm(values));
                }
                Some(_) => return Err(index),
                None => {
                    data.extend(std::iter::repeat(0.0).take(dimension));
                    present.push(false);
                    norms.push(0.0);
                }
            }
        }

        Ok(Some(Self {
            dimension,
            data,
            present,
            norms,
        }))
    }

    /// Length of every row.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of rows (documents), present or not.
    pub fn rows(&self) -> usize {
        self.present.len()
    }

    /// Number of rows that carry an embedding.
    pub fn present_rows(&self) -> usize {
        self.present.iter().filter(|p| **p).count()
    }

    /// Cosine similarity of `query` against every row, in row order.
    ///
    /// Zero-norm rows (and a zero-norm query) score `0.0`.
    pub fn cosine_scores(&self, query: &[f32]) -> Result<Vec<Option<f32>>, EmbeddingFailure> {
        if query.len() != self.dimension {
            return Err(EmbeddingFailure::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let query_norm = l2_norm(query);
        let scores = self
            .data
            .chunks_exact(self.dimension)
            .zip(self.present.iter().zip(&self.norms))
            .map(|(row, (&present, &norm))| {
                if !present {
                    None
                } else if norm == 0.0 || query_norm == 0.0 {
                    Some(0.0)
                } else {
                    Some(dot(query, row) / (query_norm * norm))
                }
            })
            .collect();

        Ok(scores)
    }
}
