use serde::{Deserialize, Serialize};

use crate::error::BuildError;
use crate::services::vectorizer::FeatureVector;

/// Dense pairwise cosine similarities.
///
/// Only the upper triangle (diagonal included) is stored, row-major, so
/// `get(i, j)` and `get(j, i)` read the same cell. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatrix {
    n: usize,
    values: Vec<f32>,
}

fn packed_len(n: usize) -> usize {
    n * (n + 1) / 2
}

impl SimilarityMatrix {
    /// Computes cosine similarity for every pair of vectors.
    ///
    /// Fails before allocating if there are more than `max_items` vectors.
    pub fn build(vectors: &[FeatureVector], max_items: usize) -> Result<Self, BuildError> {
        let n = vectors.len();
        if n > max_items {
            return Err(BuildError::TooLarge {
                items: n,
                max: max_items,
            });
        }

        if let Some(first) = vectors.first() {
            if let Some(bad) = vectors.iter().position(|v| v.dim() != first.dim()) {
                return Err(BuildError::Misaligned(format!(
                    "vector {} has dimension {}, expected {}",
                    bad,
                    vectors[bad].dim(),
                    first.dim()
                )));
            }
        }

        let norms: Vec<f64> = vectors.iter().map(FeatureVector::norm).collect();
        let mut values = Vec::with_capacity(packed_len(n));

        for i in 0..n {
            values.push(1.0);
            for j in (i + 1)..n {
                let score = if norms[i] == 0.0 || norms[j] == 0.0 {
                    0.0
                } else {
                    (vectors[i].dot(&vectors[j]) / (norms[i] * norms[j])).clamp(-1.0, 1.0)
                };
                values.push(score as f32);
            }
        }

        tracing::debug!(items = n, cells = values.len(), "Built similarity matrix");

        Ok(Self { n, values })
    }

    /// Rebuilds a matrix from its packed representation, e.g. after loading from disk
    pub fn from_packed(n: usize, values: Vec<f32>) -> Result<Self, String> {
        if values.len() != packed_len(n) {
            return Err(format!(
                "expected {} packed values for {} items, found {}",
                packed_len(n),
                n,
                values.len()
            ));
        }
        Ok(Self { n, values })
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn packed_values(&self) -> &[f32] {
        &self.values
    }

    fn offset(&self, i: usize, j: usize) -> usize {
        let (a, b) = if i <= j { (i, j) } else { (j, i) };
        a * (2 * self.n - a + 1) / 2 + (b - a)
    }

    /// Similarity of rows `i` and `j`. Panics if either index is out of range.
    pub fn get(&self, i: usize, j: usize) -> f32 {
        assert!(i < self.n && j < self.n, "index out of range");
        self.values[self.offset(i, j)]
    }

    /// All similarities of row `i`, in row order
    pub fn row(&self, i: usize) -> impl Iterator<Item = f32> + '_ {
        (0..self.n).map(move |j| self.get(i, j))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Item, Weighting};
    use crate::services::vectorizer::FeatureVectorizer;

    fn vectors(docs: &[&[&str]]) -> Vec<FeatureVector> {
        let items: Vec<Item> = docs
            .iter()
            .map(|tokens| Item {
                key: tokens.join(" "),
                id: None,
                title: tokens.join(" "),
                canonical_title: tokens.join(" "),
                year: None,
                genres: Vec::new(),
                tokens: tokens.iter().map(|t| t.to_string()).collect(),
            })
            .collect();
        FeatureVectorizer::fit(&items, Weighting::Count, None).transform_all(&items)
    }

    #[test]
    fn test_diagonal_is_one_and_matrix_symmetric() {
        let v = vectors(&[
            &["toy", "story", "animation"],
            &["toy", "story", "comedy"],
            &["heat", "action", "crime"],
            &["jumanji", "adventure", "comedy"],
        ]);
        let m = SimilarityMatrix::build(&v, 100).unwrap();

        for i in 0..m.len() {
            assert!((m.get(i, i) - 1.0).abs() < 1e-6);
            for j in 0..m.len() {
                assert_eq!(m.get(i, j), m.get(j, i));
                assert!((-1.0..=1.0).contains(&m.get(i, j)));
            }
        }
    }

    #[test]
    fn test_cosine_values() {
        let v = vectors(&[&["toy", "story"], &["toy", "heat"], &["crime"]]);
        let m = SimilarityMatrix::build(&v, 100).unwrap();
        assert!((m.get(0, 1) - 0.5).abs() < 1e-6);
        assert_eq!(m.get(0, 2), 0.0);
    }

    #[test]
    fn test_zero_vector_scores_zero() {
        let v = vectors(&[&["toy", "story"], &[], &["toy"]]);
        let m = SimilarityMatrix::build(&v, 100).unwrap();
        assert_eq!(m.get(1, 0), 0.0);
        assert_eq!(m.get(1, 2), 0.0);
        assert_eq!(m.get(1, 1), 1.0);
        assert!(m.row(1).all(|s| !s.is_nan()));
    }

    #[test]
    fn test_size_ceiling_fails_fast() {
        let v = vectors(&[&["a1"], &["b1"], &["c1"]]);
        assert_eq!(
            SimilarityMatrix::build(&v, 2),
            Err(BuildError::TooLarge { items: 3, max: 2 })
        );
    }

    #[test]
    fn test_row_matches_get() {
        let v = vectors(&[&["toy", "story"], &["toy"], &["story", "heat"]]);
        let m = SimilarityMatrix::build(&v, 100).unwrap();
        let row: Vec<f32> = m.row(2).collect();
        assert_eq!(row, vec![m.get(2, 0), m.get(2, 1), m.get(2, 2)]);
    }

    #[test]
    fn test_from_packed_validates_shape() {
        assert!(SimilarityMatrix::from_packed(2, vec![1.0, 0.5, 1.0]).is_ok());
        assert!(SimilarityMatrix::from_packed(3, vec![1.0, 0.5, 1.0]).is_err());
    }

    #[test]
    fn test_empty_input() {
        let m = SimilarityMatrix::build(&[], 10).unwrap();
        assert!(m.is_empty());
    }
}
