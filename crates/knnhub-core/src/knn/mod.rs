//! Exact k-NN engine.
//!
//! [`NeighborSetEngine`] owns the k-NN sets of a labelled dataset, computed
//! by brute force over an explicit [`DistanceMatrix`], together with the
//! reverse sets and occurrence statistics derived from them.
//!
//! The stored sets can be wider than the *active* k. Statistics for any
//! smaller k are derived from the stored prefix without searching again,
//! which is how k sweeps stay cheap.
//!
//! # Module Organization
//!
//! - `neighbor_set`: bounded sorted insertion primitive
//! - `search`: batch and single-query brute-force search
//! - `stats`: occurrence counts and `hubness_stats`
//! - `entropy`, `weights`, `lid`: per-instance measures
//! - `tabu`: incremental exclusion and completion of neighbor sets
//! - `persistence`: line-oriented text format

mod entropy;
mod lid;
mod neighbor_set;
mod persistence;
pub mod search;
mod stats;
mod tabu;
mod weights;

#[cfg(test)]
mod engine_tests;
#[cfg(test)]
mod tabu_tests;
#[cfg(test)]
mod weights_tests;

pub use entropy::entropy_of_counts;
pub use lid::LidConfig;
pub use neighbor_set::{NeighborSet, TabuSet};
pub use persistence::{read_neighbor_file, NeighborFile};
pub use stats::{hubness_stats, occurrences_at, HubnessStats, Moments, Occurrences};
pub use weights::{HubnessDirection, WeightParams};

use crate::dataset::{Dataset, Labels};
use crate::distance::DistanceOracle;
use crate::error::{Error, Result};
use crate::matrix::{ComputeReport, DistanceMatrix};
use crate::pool::{PoolReport, RowPartitionPool};
use std::sync::Arc;

/// Exact k-NN sets with reverse sets and hubness statistics.
#[derive(Debug, Clone)]
pub struct NeighborSetEngine {
    labels: Labels,
    distances: Option<Arc<DistanceMatrix>>,
    /// One set per instance; empty until computed.
    sets: Vec<NeighborSet>,
    /// Width the sets were computed at.
    stored_k: usize,
    /// Neighborhood size the statistics describe.
    active_k: usize,
    reverse: Vec<Vec<usize>>,
    occurrences: Occurrences,
    stats: HubnessStats,
}

impl NeighborSetEngine {
    /// Creates an uncomputed engine over a label source and distance matrix.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyDataset`] if there are no instances.
    /// - [`Error::SizeMismatch`] if labels and matrix disagree on `n`.
    pub fn new(labels: Labels, distances: Arc<DistanceMatrix>) -> Result<Self> {
        if labels.is_empty() {
            return Err(Error::EmptyDataset);
        }
        if labels.len() != distances.len() {
            return Err(Error::SizeMismatch {
                expected: labels.len(),
                actual: distances.len(),
            });
        }
        let mut engine = Self::detached(labels);
        engine.distances = Some(distances);
        Ok(engine)
    }

    /// Computes the distance matrix of `dataset` and wraps it in an engine.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyDataset`] for an empty dataset.
    pub fn from_dataset<D, O>(dataset: &D, oracle: &O) -> Result<(Self, ComputeReport)>
    where
        D: Dataset + ?Sized,
        O: DistanceOracle + ?Sized,
    {
        let (matrix, report) = DistanceMatrix::compute(dataset, oracle)?;
        let engine = Self::new(Labels::from_dataset(dataset), Arc::new(matrix))?;
        Ok((engine, report))
    }

    /// Like [`NeighborSetEngine::from_dataset`], computing distance rows in parallel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyDataset`] for an empty dataset.
    pub fn from_dataset_parallel<D, O>(
        dataset: &D,
        oracle: &O,
        pool: &RowPartitionPool,
    ) -> Result<(Self, ComputeReport)>
    where
        D: Dataset + ?Sized,
        O: DistanceOracle + ?Sized,
    {
        let (matrix, report) = DistanceMatrix::compute_parallel(dataset, oracle, pool)?;
        let engine = Self::new(Labels::from_dataset(dataset), Arc::new(matrix))?;
        Ok((engine, report))
    }

    /// Wraps neighbor sets computed elsewhere (approximate builder, file).
    ///
    /// Sets are widened to capacity `k`. No distance matrix is attached; operations
    /// that search for new neighbors fail until one is.
    ///
    /// # Errors
    ///
    /// - [`Error::SizeMismatch`] if `sets.len() != labels.len()`.
    /// - [`Error::InvalidK`] unless `1 <= k < n`, or if a set is wider than `k`.
    /// - [`Error::InvalidParameter`] if a set contains its owner or an out-of-range index.
    pub fn from_neighbor_sets(labels: Labels, mut sets: Vec<NeighborSet>, k: usize) -> Result<Self> {
        if labels.is_empty() {
            return Err(Error::EmptyDataset);
        }
        if sets.len() != labels.len() {
            return Err(Error::SizeMismatch {
                expected: labels.len(),
                actual: sets.len(),
            });
        }
        let mut engine = Self::detached(labels);
        engine.check_k(k)?;
        let n = sets.len();
        for (i, set) in sets.iter().enumerate() {
            if set.len() > k {
                return Err(Error::invalid_k(k, format!("set {i} holds {} neighbors", set.len())));
            }
            if let Some(&bad) = set.indices().iter().find(|&&j| j == i || j >= n) {
                return Err(Error::InvalidParameter(format!(
                    "set {i} contains invalid neighbor {bad}"
                )));
            }
        }
        sets.iter_mut().for_each(|s| s.grow(k));
        engine.install(sets, k);
        Ok(engine)
    }

    fn detached(labels: Labels) -> Self {
        let n = labels.len();
        Self {
            labels,
            distances: None,
            sets: Vec::new(),
            stored_k: 0,
            active_k: 0,
            reverse: Vec::new(),
            occurrences: Occurrences::zeros(n),
            stats: HubnessStats::default(),
        }
    }

    /// Attaches (or replaces) the distance matrix.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SizeMismatch`] if the matrix covers a different `n`.
    pub fn with_distance_matrix(mut self, distances: Arc<DistanceMatrix>) -> Result<Self> {
        if distances.len() != self.labels.len() {
            return Err(Error::SizeMismatch {
                expected: self.labels.len(),
                actual: distances.len(),
            });
        }
        self.distances = Some(distances);
        Ok(self)
    }

    fn matrix(&self, operation: &'static str) -> Result<&Arc<DistanceMatrix>> {
        self.distances
            .as_ref()
            .ok_or(Error::MissingDistanceMatrix(operation))
    }

    fn check_k(&self, k: usize) -> Result<()> {
        let n = self.labels.len();
        if k == 0 {
            return Err(Error::invalid_k(k, "must be at least 1"));
        }
        if k >= n {
            return Err(Error::invalid_k(
                k,
                format!("dataset has only {} other instances", n - 1),
            ));
        }
        Ok(())
    }

    fn ensure_computed(&self) -> Result<()> {
        if self.is_computed() {
            Ok(())
        } else {
            Err(Error::NotComputed)
        }
    }

    /// Replaces the sets and rebuilds every statistic at `k`.
    fn install(&mut self, sets: Vec<NeighborSet>, k: usize) {
        self.sets = sets;
        self.stored_k = k;
        self.rebuild_statistics(k);
    }

    /// Rebuilds reverse sets, occurrences and aggregates from the first `k` entries.
    fn rebuild_statistics(&mut self, k: usize) {
        let (occurrences, reverse) = occurrences_at(&self.sets, k, &self.labels);
        self.occurrences = occurrences;
        self.reverse = reverse;
        self.active_k = k;
        self.refresh_stats();
    }

    /// Recomputes the aggregate statistics from the current occurrence counts.
    pub fn refresh_stats(&mut self) {
        let occ = &self.occurrences;
        self.stats = hubness_stats(&occ.good, &occ.bad, &occ.total);
    }

    /// Computes the k-NN sets with one pass over the unordered pairs.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingDistanceMatrix`] if no matrix is attached.
    /// - [`Error::InvalidK`] if `k == 0` or `k >= n`.
    pub fn calculate_neighbor_sets(&mut self, k: usize) -> Result<()> {
        self.check_k(k)?;
        let matrix = Arc::clone(self.matrix("calculate_neighbor_sets")?);
        let sets = search::symmetric_neighbor_sets(&matrix, k);
        self.install(sets, k);
        tracing::debug!(n = self.len(), k, "Neighbor sets computed");
        Ok(())
    }

    /// Computes the k-NN sets with one worker per contiguous row range.
    ///
    /// Each worker scans full distance rows for the instances it owns, so no
    /// two workers write the same set. The result equals
    /// [`NeighborSetEngine::calculate_neighbor_sets`] for any thread count.
    /// Sets of a failed partition are left empty and reported.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingDistanceMatrix`] if no matrix is attached.
    /// - [`Error::InvalidK`] if `k == 0` or `k >= n`.
    pub fn calculate_neighbor_sets_parallel(
        &mut self,
        k: usize,
        pool: &RowPartitionPool,
    ) -> Result<PoolReport> {
        self.check_k(k)?;
        let matrix = Arc::clone(self.matrix("calculate_neighbor_sets_parallel")?);
        let mut sets: Vec<NeighborSet> = (0..self.len()).map(|_| NeighborSet::with_capacity(k)).collect();
        let report = pool.for_each_rows(&mut sets, |range, chunk| {
            for (slot, set) in chunk.iter_mut().zip(search::row_neighbor_sets(&matrix, range, k)) {
                *slot = set;
            }
            Ok(())
        });
        self.install(sets, k);
        tracing::debug!(n = self.len(), k, threads = pool.threads(), "Neighbor sets computed in parallel");
        Ok(report)
    }

    /// Engine restricted to the first `k_small` neighbors of every set.
    ///
    /// No search is performed: occurrence counts are obtained by subtracting
    /// the truncated tail from the current counts.
    ///
    /// # Errors
    ///
    /// - [`Error::NotComputed`] before the sets are computed.
    /// - [`Error::InvalidK`] if `k_small == 0` or exceeds the stored width.
    pub fn sub_engine(&self, k_small: usize) -> Result<Self> {
        self.ensure_computed()?;
        if k_small == 0 || k_small > self.stored_k {
            return Err(Error::invalid_k(
                k_small,
                format!("must be in [1, {}]", self.stored_k),
            ));
        }

        let sets: Vec<NeighborSet> = self.sets.iter().map(|s| s.prefix(k_small)).collect();
        let mut sub = Self::detached(self.labels.clone());
        sub.distances = self.distances.clone();

        if k_small <= self.active_k {
            let mut occ = self.occurrences.clone();
            for (owner, set) in self.sets.iter().enumerate() {
                let active = set.len().min(self.active_k);
                for &neighbor in set.indices().get(k_small..active).unwrap_or(&[]) {
                    occ.remove(owner, neighbor, &self.labels);
                }
            }
            let reverse = self
                .reverse
                .iter()
                .enumerate()
                .map(|(i, owners)| {
                    owners
                        .iter()
                        .copied()
                        .filter(|&o| sets[o].contains(i))
                        .collect()
                })
                .collect();
            sub.sets = sets;
            sub.stored_k = k_small;
            sub.active_k = k_small;
            sub.occurrences = occ;
            sub.reverse = reverse;
            sub.refresh_stats();
        } else {
            sub.install(sets, k_small);
        }
        Ok(sub)
    }

    /// Projects the neighbor structure onto a subset of instances.
    ///
    /// `prototypes` are strictly ascending indices into this engine;
    /// `proto_distances` and `proto_labels` describe them in that order.
    /// Neighbors that are themselves prototypes are kept (remapped); missing
    /// ones are found by scanning the projected index intervals between the
    /// known neighbors.
    ///
    /// # Errors
    ///
    /// - [`Error::NotComputed`] before the sets are computed.
    /// - [`Error::InvalidParameter`] if prototypes are unsorted or out of range.
    /// - [`Error::SizeMismatch`] if the projected matrix or labels disagree.
    /// - [`Error::InvalidK`] if `k_small == 0` or `k_small >= prototypes.len()`.
    pub fn project_onto(
        &self,
        k_small: usize,
        prototypes: &[usize],
        proto_distances: Arc<DistanceMatrix>,
        proto_labels: Labels,
    ) -> Result<Self> {
        self.ensure_computed()?;
        let m = prototypes.len();
        if prototypes.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::InvalidParameter(
                "prototype indices must be strictly ascending".into(),
            ));
        }
        if let Some(&bad) = prototypes.iter().find(|&&p| p >= self.len()) {
            return Err(Error::IndexOutOfRange {
                index: bad,
                len: self.len(),
            });
        }
        if proto_distances.len() != m || proto_labels.len() != m {
            return Err(Error::SizeMismatch {
                expected: m,
                actual: if proto_distances.len() == m {
                    proto_labels.len()
                } else {
                    proto_distances.len()
                },
            });
        }
        if k_small == 0 || k_small >= m {
            return Err(Error::invalid_k(
                k_small,
                format!("projection has only {} other instances", m.saturating_sub(1)),
            ));
        }

        let mut to_proto = vec![None; self.len()];
        for (p, &original) in prototypes.iter().enumerate() {
            to_proto[original] = Some(p);
        }

        let mut refilled = 0usize;
        let sets: Vec<NeighborSet> = prototypes
            .iter()
            .enumerate()
            .map(|(p, &original)| {
                let mut set = NeighborSet::with_capacity(k_small);
                for neighbor in self.sets[original].indices() {
                    if set.is_full() {
                        break;
                    }
                    if let Some(q) = to_proto[*neighbor] {
                        set.insert(q, proto_distances.get(p, q));
                    }
                }
                if !set.is_full() {
                    refilled += 1;
                    set.fill_from_gaps(p, m, None, |q| proto_distances.get(p, q));
                }
                set
            })
            .collect();

        tracing::debug!(prototypes = m, k = k_small, refilled, "Neighbor sets projected");
        let mut projected = Self::detached(proto_labels);
        projected.distances = Some(proto_distances);
        projected.install(sets, k_small);
        Ok(projected)
    }

    /// Recomputes statistics from the first `k_small` stored neighbors.
    ///
    /// # Errors
    ///
    /// - [`Error::NotComputed`] before the sets are computed.
    /// - [`Error::InvalidK`] if `k_small == 0` or exceeds the stored width.
    pub fn recalculate_stats_for_k(&mut self, k_small: usize) -> Result<()> {
        self.ensure_computed()?;
        if k_small == 0 || k_small > self.stored_k {
            return Err(Error::invalid_k(
                k_small,
                format!("must be in [1, {}]", self.stored_k),
            ));
        }
        self.rebuild_statistics(k_small);
        Ok(())
    }

    /// Occurrence frequencies for every k in `1..=stored_k`.
    ///
    /// `result[k - 1][i]` is the occurrence frequency of `i` at `k`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotComputed`] before the sets are computed.
    pub fn occurrence_frequencies_for_all_k(&self) -> Result<Vec<Vec<usize>>> {
        self.ensure_computed()?;
        let mut all = Vec::with_capacity(self.stored_k);
        let mut current = vec![0usize; self.len()];
        for column in 0..self.stored_k {
            for set in &self.sets {
                if let Some(&neighbor) = set.indices().get(column) {
                    current[neighbor] += 1;
                }
            }
            all.push(current.clone());
        }
        Ok(all)
    }

    /// Returns true once neighbor sets exist.
    #[must_use]
    pub fn is_computed(&self) -> bool {
        self.active_k > 0
    }

    /// Number of instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns true if the engine covers no instances.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Neighborhood size the statistics describe.
    #[must_use]
    pub fn k(&self) -> usize {
        self.active_k
    }

    /// Width of the stored neighbor sets.
    #[must_use]
    pub fn stored_k(&self) -> usize {
        self.stored_k
    }

    /// Label source.
    #[must_use]
    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    /// Attached distance matrix, if any.
    #[must_use]
    pub fn distance_matrix(&self) -> Option<&Arc<DistanceMatrix>> {
        self.distances.as_ref()
    }

    /// Stored neighbor sets (full width).
    #[must_use]
    pub fn neighbor_sets(&self) -> &[NeighborSet] {
        &self.sets
    }

    /// Active neighbors of `i`, nearest first.
    ///
    /// # Panics
    ///
    /// Panics if `i >= self.len()`.
    #[must_use]
    pub fn neighbors(&self, i: usize) -> &[usize] {
        let set = self.sets[i].indices();
        &set[..set.len().min(self.active_k)]
    }

    /// Distances to the active neighbors of `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= self.len()`.
    #[must_use]
    pub fn neighbor_distances(&self, i: usize) -> &[f32] {
        let d = self.sets[i].distances();
        &d[..d.len().min(self.active_k)]
    }

    /// Active neighbor indices of every instance, as owned arrays.
    #[must_use]
    pub fn kneighbors(&self) -> Vec<Vec<usize>> {
        (0..self.len()).map(|i| self.neighbors(i).to_vec()).collect()
    }

    /// Active neighbor distances of every instance, as owned arrays.
    #[must_use]
    pub fn kdistances(&self) -> Vec<Vec<f32>> {
        (0..self.len())
            .map(|i| self.neighbor_distances(i).to_vec())
            .collect()
    }

    /// Instances having `i` among their active neighbors, ascending.
    ///
    /// # Panics
    ///
    /// Panics if `i >= self.len()`.
    #[must_use]
    pub fn reverse_neighbors(&self, i: usize) -> &[usize] {
        &self.reverse[i]
    }

    /// Per-instance occurrence counts at the active k.
    #[must_use]
    pub fn occurrences(&self) -> &Occurrences {
        &self.occurrences
    }

    /// Aggregate statistics, as of the last refresh.
    #[must_use]
    pub fn stats(&self) -> &HubnessStats {
        &self.stats
    }

    /// Instances whose occurrence exceeds the mean by `stdevs` standard deviations.
    #[must_use]
    pub fn hubs(&self, stdevs: f32) -> Vec<usize> {
        let threshold = self.stats.total.mean + stdevs * self.stats.total.stdev;
        (0..self.len())
            .filter(|&i| self.occurrences.total[i] as f32 > threshold)
            .collect()
    }

    /// The `count` least frequently occurring instances, ties by index.
    #[must_use]
    pub fn anti_hubs(&self, count: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by_key(|&i| (self.occurrences.total[i], i));
        order.truncate(count);
        order
    }

    /// Instances that occur in no neighbor set.
    #[must_use]
    pub fn orphans(&self) -> Vec<usize> {
        (0..self.len())
            .filter(|&i| self.occurrences.total[i] == 0)
            .collect()
    }

    /// Fraction of all occurrences that are label mismatches.
    #[must_use]
    pub fn bad_hubness_ratio(&self) -> f32 {
        let total: usize = self.occurrences.total.iter().sum();
        if total == 0 {
            return 0.0;
        }
        self.occurrences.bad.iter().sum::<usize>() as f32 / total as f32
    }

    /// Label distribution of the active neighbors of `i` (sums to 1 unless empty).
    #[must_use]
    pub fn neighbor_label_distribution(&self, i: usize) -> Vec<f32> {
        let mut dist = vec![0.0f32; self.labels.num_categories()];
        let neighbors = self.neighbors(i);
        for &j in neighbors {
            dist[self.labels.get(j)] += 1.0;
        }
        if !neighbors.is_empty() {
            let n = neighbors.len() as f32;
            dist.iter_mut().for_each(|p| *p /= n);
        }
        dist
    }
}
