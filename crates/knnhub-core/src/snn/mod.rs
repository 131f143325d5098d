//! Shared-neighbor (secondary) similarity.
//!
//! Two points are similar when their k-NN sets overlap. The engine indexes
//! the first `k_snn` neighbors of every instance into a hash map from id to
//! rank, so one membership test is O(1) and one pairwise count is
//! O(`k_snn`). `k_snn` is independent of the k used for classification.
//!
//! Counts can be weighted per shared neighbor (see [`InstanceWeighting`]),
//! typically to stop hubs from making everything look similar.

mod matrix;
mod weighting;


pub use matrix::SharedNeighborMatrix;
pub use weighting::InstanceWeighting;

use crate::dataset::Dataset;
use crate::distance::DistanceOracle;
use crate::error::{Error, Result};
use crate::knn::search::{nearest_from_row, nearest_in_dataset};
use crate::knn::{NeighborSetEngine, WeightParams};
use crate::matrix::ComputeReport;
use crate::pool::{PoolReport, RowPartitionPool};
use rustc_hash::FxHashMap;

/// Shared-neighbor counts over the k-NN sets of an exact engine.
#[derive(Debug, Clone)]
pub struct SharedNeighborEngine {
    k_snn: usize,
    weighting: InstanceWeighting,
    /// First `k_snn` neighbors of each instance, nearest first.
    neighbors: Vec<Vec<usize>>,
    /// `ranks[i][id]` = position of `id` in `neighbors[i]`.
    ranks: Vec<FxHashMap<usize, usize>>,
    weights: Option<Vec<f32>>,
}

impl SharedNeighborEngine {
    /// Unweighted counts at `k_snn`.
    ///
    /// # Errors
    ///
    /// See [`SharedNeighborEngine::with_weighting`].
    pub fn new(engine: &NeighborSetEngine, k_snn: usize) -> Result<Self> {
        Self::with_weighting(engine, k_snn, InstanceWeighting::Unweighted, &WeightParams::default())
    }

    /// Indexes the first `k_snn` neighbors of every instance of `engine`.
    ///
    /// Instance weights are derived from the engine's statistics at
    /// `k_snn`, whatever its active k is.
    ///
    /// # Errors
    ///
    /// - [`Error::NotComputed`] before the engine's sets are computed.
    /// - [`Error::InvalidK`] if `k_snn == 0` or exceeds the stored width.
    pub fn with_weighting(
        engine: &NeighborSetEngine,
        k_snn: usize,
        weighting: InstanceWeighting,
        params: &WeightParams,
    ) -> Result<Self> {
        if !engine.is_computed() {
            return Err(Error::NotComputed);
        }
        let narrowed;
        let basis = if engine.k() == k_snn {
            engine
        } else {
            narrowed = engine.sub_engine(k_snn)?;
            &narrowed
        };

        let neighbors: Vec<Vec<usize>> = (0..basis.len()).map(|i| basis.neighbors(i).to_vec()).collect();
        let ranks = neighbors
            .iter()
            .map(|ids| ids.iter().enumerate().map(|(rank, &id)| (id, rank)).collect())
            .collect();
        let weights = weighting.weights(basis, params)?;

        tracing::info!(
            n = neighbors.len(),
            k_snn,
            weighting = ?weighting,
            "Indexed shared-neighbor sets"
        );
        Ok(Self {
            k_snn,
            weighting,
            neighbors,
            ranks,
            weights,
        })
    }

    /// Neighborhood size of the indexed sets.
    #[must_use]
    pub fn k_snn(&self) -> usize {
        self.k_snn
    }

    /// Number of indexed instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    /// Returns true if no instance is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    /// Weighting scheme in use.
    #[must_use]
    pub fn weighting(&self) -> InstanceWeighting {
        self.weighting
    }

    /// Per-instance weights; `None` when unweighted.
    #[must_use]
    pub fn weights(&self) -> Option<&[f32]> {
        self.weights.as_deref()
    }

    /// Indexed neighbors of `i`, nearest first.
    ///
    /// # Panics
    ///
    /// Panics if `i >= self.len()`.
    #[must_use]
    pub fn neighbors(&self, i: usize) -> &[usize] {
        &self.neighbors[i]
    }

    /// Position of `id` in the indexed set of `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= self.len()`.
    #[must_use]
    pub fn rank_of(&self, i: usize, id: usize) -> Option<usize> {
        self.ranks[i].get(&id).copied()
    }

    #[inline]
    fn weight(&self, id: usize) -> f32 {
        self.weights.as_ref().map_or(1.0, |w| w[id])
    }

    /// Weighted size of `ids ∩ N(j)`.
    fn overlap(&self, ids: &[usize], j: usize) -> f32 {
        let lookup = &self.ranks[j];
        ids.iter()
            .filter(|id| lookup.contains_key(id))
            .map(|&id| self.weight(id))
            .sum()
    }

    fn self_count(&self, i: usize) -> f32 {
        match self.weights {
            None => self.k_snn as f32,
            Some(_) => self.neighbors[i].iter().map(|&id| self.weight(id)).sum(),
        }
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.len() {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }
        Ok(())
    }

    /// Shared-neighbor count of two indexed instances.
    ///
    /// `shared_count(i, i)` is `k_snn` unweighted, or the weight mass of
    /// `i`'s own set when weighted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfRange`] for an unknown index.
    pub fn shared_count(&self, i: usize, j: usize) -> Result<f32> {
        self.check_index(i)?;
        self.check_index(j)?;
        if i == j {
            return Ok(self.self_count(i));
        }
        Ok(self.overlap(&self.neighbors[i], j))
    }

    fn upper_row(&self, i: usize) -> Vec<f32> {
        ((i + 1)..self.len())
            .map(|j| self.overlap(&self.neighbors[i], j))
            .collect()
    }

    fn diagonal(&self) -> Vec<f32> {
        (0..self.len()).map(|i| self.self_count(i)).collect()
    }

    /// All pairwise counts on the calling thread.
    #[must_use]
    pub fn count_shared_neighbors(&self) -> SharedNeighborMatrix {
        let rows = (0..self.len()).map(|i| self.upper_row(i)).collect();
        SharedNeighborMatrix::new(self.k_snn, self.diagonal(), rows)
    }

    /// All pairwise counts, rows partitioned across `pool`.
    ///
    /// Each worker fills only its own rows. Rows of a failed partition are
    /// left at zero and counted in the report.
    pub fn count_shared_neighbors_parallel(&self, pool: &RowPartitionPool) -> (SharedNeighborMatrix, PoolReport) {
        let n = self.len();
        let mut rows: Vec<Vec<f32>> = (0..n).map(|i| vec![0.0; n - i - 1]).collect();
        let report = pool.for_each_rows(&mut rows, |range, chunk| {
            for (i, row) in range.zip(chunk.iter_mut()) {
                *row = self.upper_row(i);
            }
            Ok(())
        });
        (SharedNeighborMatrix::new(self.k_snn, self.diagonal(), rows), report)
    }

    fn counts_for_set(&self, ids: &[usize]) -> Vec<f32> {
        (0..self.len()).map(|j| self.overlap(ids, j)).collect()
    }

    /// Counts between an unindexed `query` and every indexed instance.
    ///
    /// The query's own `k_snn` neighbors are searched in `dataset`, which
    /// must be the dataset the engine was built on.
    ///
    /// # Errors
    ///
    /// - [`Error::SizeMismatch`] if `dataset` has a different size.
    /// - [`Error::InvalidK`] if `k_snn` exceeds the dataset size.
    pub fn shared_counts_for_query<D, O>(
        &self,
        dataset: &D,
        oracle: &O,
        query: &[f32],
    ) -> Result<(Vec<f32>, ComputeReport)>
    where
        D: Dataset + ?Sized,
        O: DistanceOracle + ?Sized,
    {
        self.check_dataset(dataset)?;
        let (set, report) = nearest_in_dataset(dataset, oracle, query, self.k_snn, None)?;
        Ok((self.counts_for_set(set.indices()), report))
    }

    /// Counts between a query given by its distances to every indexed
    /// instance (`row[j]`) and every indexed instance.
    ///
    /// # Errors
    ///
    /// - [`Error::SizeMismatch`] if `row` does not cover every instance.
    /// - [`Error::InvalidK`] if `k_snn > row.len()`.
    pub fn shared_counts_for_row(&self, row: &[f32]) -> Result<Vec<f32>> {
        if row.len() != self.len() {
            return Err(Error::SizeMismatch {
                expected: self.len(),
                actual: row.len(),
            });
        }
        let set = nearest_from_row(row, self.k_snn, None)?;
        Ok(self.counts_for_set(set.indices()))
    }

    /// Count between two unindexed points, both searched in `dataset`.
    ///
    /// # Errors
    ///
    /// Same as [`SharedNeighborEngine::shared_counts_for_query`].
    pub fn shared_count_between<D, O>(
        &self,
        dataset: &D,
        oracle: &O,
        a: &[f32],
        b: &[f32],
    ) -> Result<(f32, ComputeReport)>
    where
        D: Dataset + ?Sized,
        O: DistanceOracle + ?Sized,
    {
        self.check_dataset(dataset)?;
        let (set_a, mut report) = nearest_in_dataset(dataset, oracle, a, self.k_snn, None)?;
        let (set_b, report_b) = nearest_in_dataset(dataset, oracle, b, self.k_snn, None)?;
        report.merge(report_b);
        let count = set_a
            .indices()
            .iter()
            .filter(|&&id| set_b.contains(id))
            .map(|&id| self.weight(id))
            .sum();
        Ok((count, report))
    }

    fn check_dataset<D: Dataset + ?Sized>(&self, dataset: &D) -> Result<()> {
        if dataset.len() != self.len() {
            return Err(Error::SizeMismatch {
                expected: self.len(),
                actual: dataset.len(),
            });
        }
        Ok(())
    }
}
