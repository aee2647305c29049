use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Weights applied to the normalized lexical and semantic scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    /// Weight of the BM25 signal.
    #[serde(default = "default_lexical_weight")]
    pub lexical: f32,
    /// Weight of the embedding signal.
    #[serde(default = "default_semantic_weight")]
    pub semantic: f32,
}

fn default_lexical_weight() -> f32 {
    0.3
}

fn default_semantic_weight() -> f32 {
    0.7
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            lexical: default_lexical_weight(),
            semantic: default_semantic_weight(),
        }
    }
}

/// Min-max scale scores into `[0, 1]`.
///
/// A constant input (including all zeros and the empty slice) maps to all
/// zeros.
pub fn min_max_normalize(scores: &[f32]) -> Vec<f32> {
    let (min, max) = bounds(scores.iter().copied());
    let range = max - min;
    if scores.is_empty() || range <= 0.0 || !range.is_finite() {
        return vec![0.0; scores.len()];
    }
    scores.iter().map(|s| (s - min) / range).collect()
}

/// Min-max scale the present scores; absent entries stay absent and do not
/// take part in the min/max.
pub fn min_max_normalize_sparse(scores: &[Option<f32>]) -> Vec<Option<f32>> {
    let (min, max) = bounds(scores.iter().flatten().copied());
    let range = max - min;
    let constant = range <= 0.0 || !range.is_finite();
    scores
        .iter()
        .map(|s| s.map(|v| if constant { 0.0 } else { (v - min) / range }))
        .collect()
}

fn bounds(scores: impl Iterator<Item = f32>) -> (f32, f32) {
    scores.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), s| {
        (lo.min(s), hi.max(s))
    })
}

/// Combine raw lexical scores with optional raw semantic scores.
///
/// Both inputs are parallel arrays over the same corpus ordering. Without a
/// semantic vector the result is exactly the normalized lexical vector.
/// Documents whose semantic entry is `None` only receive the lexical part.
pub fn fuse(lexical: &[f32], semantic: Option<&[Option<f32>]>, weights: FusionWeights) -> Vec<f32> {
    let lexical = min_max_normalize(lexical);
    let Some(semantic) = semantic else {
        return lexical;
    };
    debug_assert_eq!(lexical.len(), semantic.len());

    let semantic = min_max_normalize_sparse(semantic);
    lexical
        .iter()
        .zip(&semantic)
        .map(|(lex, sem)| weights.lexical * lex + weights.semantic * sem.unwrap_or(0.0))
        .collect()
}

/// Select the top `n` documents by fused score.
///
/// Ties are broken by corpus index ascending. If no score is positive the
/// ranking is empty.
pub fn rank(fused: &[f32], n: usize) -> Vec<(usize, f32)> {
    if n == 0 || !fused.iter().any(|s| *s > 0.0) {
        return Vec::new();
    }

    let mut ranked: Vec<(usize, f32)> = fused.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    ranked.truncate(n);
    ranked
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-6;

    #[test]
    fn test_normalize_constant_is_zero() {
        assert_eq!(min_max_normalize(&[3.0, 3.0, 3.0]), vec![0.0, 0.0, 0.0]);
        assert_eq!(min_max_normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
        assert!(min_max_normalize(&[]).is_empty());
    }

    #[test]
    fn test_normalize_range() {
        let n = min_max_normalize(&[2.0, 4.0, 3.0]);
        assert!((n[0] - 0.0).abs() < EPS);
        assert!((n[1] - 1.0).abs() < EPS);
        assert!((n[2] - 0.5).abs() < EPS);
    }

    #[test]
    fn test_sparse_normalize_ignores_missing() {
        let n = min_max_normalize_sparse(&[Some(0.5), None, Some(0.9), Some(0.7)]);
        assert_eq!(n[1], None);
        assert!((n[0].unwrap() - 0.0).abs() < EPS);
        assert!((n[2].unwrap() - 1.0).abs() < EPS);
        assert!((n[3].unwrap() - 0.5).abs() < EPS);
    }

    #[test]
    fn test_fuse_without_semantic_equals_normalized_lexical() {
        let lexical = [0.0, 1.7, 0.4, 3.2];
        assert_eq!(
            fuse(&lexical, None, FusionWeights::default()),
            min_max_normalize(&lexical)
        );
    }

    #[test]
    fn test_fuse_weights() {
        let lexical = [0.0, 2.0];
        let semantic = [Some(1.0), Some(0.0)];
        let fused = fuse(&lexical, Some(&semantic), FusionWeights::default());
        assert!((fused[0] - 0.7).abs() < EPS);
        assert!((fused[1] - 0.3).abs() < EPS);
    }

    #[test]
    fn test_fuse_missing_embedding_is_lexical_only() {
        let lexical = [0.0, 2.0];
        let semantic = [Some(0.2), None];
        let fused = fuse(&lexical, Some(&semantic), FusionWeights::default());
        assert!((fused[0] - 0.0).abs() < EPS);
        assert!((fused[1] - 0.3).abs() < EPS);
    }

    #[test]
    fn test_rank_non_positive_is_empty() {
        assert!(rank(&[0.0, 0.0, 0.0], 5).is_empty());
        assert!(rank(&[-1.0, 0.0], 5).is_empty());
        assert!(rank(&[], 5).is_empty());
        assert!(rank(&[1.0], 0).is_empty());
    }

    #[test]
    fn test_rank_descending_with_index_tie_break() {
        let ranked = rank(&[0.5, 1.0, 0.5, 0.0, 1.0], 4);
        let order: Vec<usize> = ranked.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![1, 4, 0, 2]);
    }

    #[test]
    fn test_rank_truncates() {
        assert_eq!(rank(&[0.1, 0.2, 0.3], 2).len(), 2);
        assert_eq!(rank(&[0.1, 0.2, 0.3], 10).len(), 3);
    }
}
