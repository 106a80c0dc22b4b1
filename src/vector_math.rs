use ndarray::{Array1, Array2, ArrayView1, Axis};

/// Row-normalized embedding matrix for brute-force cosine search.
#[derive(Debug, Clone)]
pub struct NormalizedMatrix {
    rows: Array2<f32>,
}

impl NormalizedMatrix {
    /// Build from equal-length vectors. Returns `None` on ragged input.
    pub fn from_vectors(vectors: &[Vec<f32>], dimension: usize) -> Option<Self> {
        if vectors.iter().any(|v| v.len() != dimension) {
            return None;
        }
        let flat: Vec<f32> = vectors.iter().flatten().copied().collect();
        let mut rows = Array2::from_shape_vec((vectors.len(), dimension), flat).ok()?;
        for mut row in rows.axis_iter_mut(Axis(0)) {
            let norm = l2_norm(row.view());
            if norm > f32::EPSILON {
                row.mapv_inplace(|x| x / norm);
            }
        }
        Some(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.nrows() == 0
    }

    pub fn dimension(&self) -> usize {
        self.rows.ncols()
    }

    /// Cosine similarity of `query` against every row, in row order.
    pub fn cosine_scores(&self, query: &[f32]) -> Vec<f32> {
        if query.len() != self.dimension() || self.is_empty() {
            return Vec::new();
        }
        let query = Array1::from_vec(query.to_vec());
        let norm = l2_norm(query.view());
        if norm <= f32::EPSILON {
            return vec![0.0; self.len()];
        }
        let scores = self.rows.dot(&query) / norm;
        scores.to_vec()
    }
}

/// Indices of the `k` highest scores, best first. Ties keep row order;
/// NaN ranks below every number.
pub fn top_k_descending(scores: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut ranked: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
    ranked.sort_by(|left, right| rank_key(right.1).total_cmp(&rank_key(left.1)));
    ranked.truncate(k);
    ranked
}

fn rank_key(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}

fn l2_norm(vector: ArrayView1<f32>) -> f32 {
    vector.dot(&vector).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(left: f32, right: f32) -> bool {
        (left - right).abs() < 1e-5
    }

    #[test]
    fn cosine_is_one_for_identical_vectors() {
        let v = vec![1.0, 2.0, 3.0, 4.0];
        let matrix = NormalizedMatrix::from_vectors(&[v.clone()], 4).expect("matrix");
        let scores = matrix.cosine_scores(&v);
        assert!(approx_eq(scores[0], 1.0));
    }

    #[test]
    fn cosine_is_zero_for_orthogonal_vectors() {
        let matrix = NormalizedMatrix::from_vectors(&[vec![0.0, 1.0]], 2).expect("matrix");
        assert!(approx_eq(matrix.cosine_scores(&[1.0, 0.0])[0], 0.0));
    }

    #[test]
    fn zero_vectors_score_zero() {
        let matrix =
            NormalizedMatrix::from_vectors(&[vec![0.0, 0.0], vec![1.0, 0.0]], 2).expect("matrix");
        let scores = matrix.cosine_scores(&[0.0, 0.0]);
        assert_eq!(scores, vec![0.0, 0.0]);
        assert!(approx_eq(matrix.cosine_scores(&[1.0, 0.0])[0], 0.0));
    }

    #[test]
    fn ragged_vectors_are_rejected() {
        assert!(NormalizedMatrix::from_vectors(&[vec![1.0, 0.0], vec![1.0]], 2).is_none());
    }

    #[test]
    fn ranking_returns_highest_similarity_first() {
        let matrix = NormalizedMatrix::from_vectors(
            &[vec![0.8, 0.2], vec![0.1, 0.9], vec![0.9, 0.0]],
            2,
        )
        .expect("matrix");
        let ranked = top_k_descending(&matrix.cosine_scores(&[1.0, 0.0]), 3);

        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].0, 2);
        assert_eq!(ranked[2].0, 1);
    }

    #[test]
    fn top_k_truncates_and_keeps_ties_stable() {
        let ranked = top_k_descending(&[0.5, 0.9, 0.5, 0.1], 3);
        let order: Vec<usize> = ranked.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![1, 0, 2]);
        assert!(top_k_descending(&[0.3], 5).len() == 1);
        assert!(top_k_descending(&[], 3).is_empty());
    }

    #[test]
    fn nan_scores_rank_last_without_disturbing_order() {
        let ranked = top_k_descending(&[0.2, f32::NAN, 0.7, 0.4, f32::NAN, 0.9], 6);
        let order: Vec<usize> = ranked.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![5, 2, 3, 0, 1, 4]);

        let top: Vec<usize> = top_k_descending(&[f32::NAN, 0.1, 0.3], 2)
            .iter()
            .map(|(i, _)| *i)
            .collect();
        assert_eq!(top, vec![2, 1]);
    }
}
