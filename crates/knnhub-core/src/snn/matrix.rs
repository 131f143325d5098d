//! Pairwise shared-neighbor counts.

use crate::matrix::DistanceMatrix;

/// Symmetric matrix of (weighted) shared-neighbor counts.
///
/// Stores the strict upper triangle row by row plus an explicit diagonal,
/// since `count(i, i)` is not zero.
#[derive(Debug, Clone, PartialEq)]
pub struct SharedNeighborMatrix {
    k_snn: usize,
    diagonal: Vec<f32>,
    /// `rows[i][j - i - 1]` = count between `i` and `j > i`.
    rows: Vec<Vec<f32>>,
}

impl SharedNeighborMatrix {
    pub(crate) fn new(k_snn: usize, diagonal: Vec<f32>, rows: Vec<Vec<f32>>) -> Self {
        debug_assert_eq!(diagonal.len(), rows.len());
        debug_assert!(rows.iter().enumerate().all(|(i, r)| r.len() == rows.len() - i - 1));
        Self { k_snn, diagonal, rows }
    }

    /// Neighborhood size the counts were taken at.
    #[must_use]
    pub fn k_snn(&self) -> usize {
        self.k_snn
    }

    /// Number of instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true for a matrix over no instances.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Count between `i` and `j`, in either order.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> f32 {
        match i.cmp(&j) {
            std::cmp::Ordering::Equal => self.diagonal[i],
            std::cmp::Ordering::Less => self.rows[i][j - i - 1],
            std::cmp::Ordering::Greater => self.rows[j][i - j - 1],
        }
    }

    /// Upper-triangular row `i`: counts against `i + 1..n`.
    #[must_use]
    pub fn row(&self, i: usize) -> &[f32] {
        &self.rows[i]
    }

    /// All counts of `i`, diagonal included.
    #[must_use]
    pub fn full_row(&self, i: usize) -> Vec<f32> {
        (0..self.len()).map(|j| self.get(i, j)).collect()
    }

    /// Counts divided by `k_snn`.
    #[must_use]
    pub fn to_similarity(&self) -> Self {
        let scale = 1.0 / self.k_snn.max(1) as f32;
        Self {
            k_snn: self.k_snn,
            diagonal: self.diagonal.iter().map(|c| c * scale).collect(),
            rows: self
                .rows
                .iter()
                .map(|r| r.iter().map(|c| c * scale).collect())
                .collect(),
        }
    }

    /// `1 - count / k_snn`, floored at 0, as a distance matrix.
    ///
    /// The diagonal is dropped: distance matrices have an implicit zero
    /// diagonal.
    #[must_use]
    pub fn to_distance(&self) -> DistanceMatrix {
        let similarity = self.to_similarity();
        DistanceMatrix::from_fn(self.len(), |i, j| (1.0 - similarity.get(i, j)).max(0.0))
    }
}
