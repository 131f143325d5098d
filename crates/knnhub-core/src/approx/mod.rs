//! Approximate k-NN graph by recursive spectral bisection.
//!
//! [`ApproximateGraphBuilder`] avoids the full `O(n²)` distance matrix on
//! large datasets. The point set is split recursively along the approximate
//! first principal direction of each subset (Lanczos), with an overlapping
//! middle band glueing the two halves. Small subsets are solved exactly;
//! their neighbor lists are merged upward and finally refined with a
//! neighbor-of-neighbor pass.
//!
//! For `n <= division_threshold` the result equals the exact engine's.
//!
//! # Module Organization
//!
//! - `cache`: pairwise distances computed at most once
//! - `lanczos`: Golub–Kahan–Lanczos projection
//! - `tree`: partition arena, split rule and conquer step

mod cache;
mod lanczos;
mod tree;

#[cfg(test)]
mod builder_tests;

pub use cache::DistanceCache;

use crate::dataset::{Cluster, Dataset, Labels};
use crate::distance::DistanceOracle;
use crate::error::{Error, Result};
use crate::knn::{search, NeighborSet, NeighborSetEngine};
use crate::matrix::{ComputeReport, DistanceMatrix};
use crate::metrics;
use lanczos::{dominant_projection, KrylovParams};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tree::{split_by_projection, PartitionTree};

/// Approximate builder configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApproximateConfig {
    /// Subset size at or below which k-NN is solved exactly.
    /// `None` means `max(5k, 100)`.
    pub division_threshold: Option<usize>,
    /// Krylov subspace dimension `s`.
    pub subspace_dim: usize,
    /// Fraction of a subset placed in the middle band.
    pub overlap_ratio: f32,
    /// Power iteration cap.
    pub power_iterations: usize,
    /// Power iteration stops when the L1 change is below `s` times this.
    pub power_tolerance: f32,
    /// Neighbor-of-neighbor passes after the root is conquered.
    pub refinement_passes: usize,
    /// Seed of the Lanczos start vectors.
    pub seed: u64,
}

impl Default for ApproximateConfig {
    fn default() -> Self {
        Self {
            division_threshold: None,
            subspace_dim: 5,
            overlap_ratio: 0.2,
            power_iterations: 20,
            power_tolerance: 0.05,
            refinement_passes: 1,
            seed: 42,
        }
    }
}

impl ApproximateConfig {
    /// Effective division threshold for neighborhood size `k`.
    #[must_use]
    pub fn division_threshold_for(&self, k: usize) -> usize {
        self.division_threshold
            .unwrap_or_else(|| (5 * k).max(100))
    }

    /// Validates the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.division_threshold == Some(0) {
            return Err(Error::InvalidParameter(
                "division_threshold must be at least 1".into(),
            ));
        }
        if self.subspace_dim == 0 {
            return Err(Error::InvalidParameter("subspace_dim must be at least 1".into()));
        }
        if !(0.0..1.0).contains(&self.overlap_ratio) {
            return Err(Error::InvalidParameter(format!(
                "overlap_ratio must be in [0, 1), got {}",
                self.overlap_ratio
            )));
        }
        if self.power_iterations == 0 {
            return Err(Error::InvalidParameter(
                "power_iterations must be at least 1".into(),
            ));
        }
        if !(self.power_tolerance.is_finite() && self.power_tolerance > 0.0) {
            return Err(Error::InvalidParameter(format!(
                "power_tolerance must be positive, got {}",
                self.power_tolerance
            )));
        }
        Ok(())
    }

    fn krylov(&self) -> KrylovParams {
        KrylovParams {
            subspace_dim: self.subspace_dim,
            max_iterations: self.power_iterations,
            tolerance_per_dim: self.power_tolerance,
        }
    }
}

/// Counters of one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BuildStats {
    /// Subsets solved exactly.
    pub leaves: usize,
    /// Subsets bisected.
    pub splits: usize,
    /// Bisections that fell back to the median.
    pub median_fallbacks: usize,
    /// Largest number of simultaneously live partition nodes.
    pub peak_live_nodes: usize,
    /// Distance lookups answered by the cache.
    pub cache_hits: usize,
    /// Insertions made by the refinement passes.
    pub refined: usize,
    /// Sets completed by the final scan.
    pub completed: usize,
}

/// Approximate k-NN sets in the exact engine's shape.
#[derive(Debug, Clone)]
pub struct ApproximateKnnGraph {
    k: usize,
    sets: Vec<NeighborSet>,
    report: ComputeReport,
    stats: BuildStats,
}

impl ApproximateKnnGraph {
    /// Neighborhood size.
    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Number of instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Returns true if the graph covers no instances.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Neighbor sets, one per instance.
    #[must_use]
    pub fn neighbor_sets(&self) -> &[NeighborSet] {
        &self.sets
    }

    /// Neighbors of `i`, nearest first.
    #[must_use]
    pub fn neighbors(&self, i: usize) -> &[usize] {
        self.sets[i].indices()
    }

    /// Distances to the neighbors of `i`.
    #[must_use]
    pub fn distances(&self, i: usize) -> &[f32] {
        self.sets[i].distances()
    }

    /// Neighbor indices of every instance, as owned arrays.
    #[must_use]
    pub fn kneighbors(&self) -> Vec<Vec<usize>> {
        self.sets.iter().map(|s| s.indices().to_vec()).collect()
    }

    /// Oracle calls made during the build.
    #[must_use]
    pub fn report(&self) -> ComputeReport {
        self.report
    }

    /// Build counters.
    #[must_use]
    pub fn stats(&self) -> BuildStats {
        self.stats
    }

    /// Mean fraction of each instance's exact neighbors that were found.
    ///
    /// # Errors
    ///
    /// - [`Error::NotComputed`] if `exact` has no sets.
    /// - [`Error::SizeMismatch`] if the instance counts differ.
    pub fn recall_against(&self, exact: &NeighborSetEngine) -> Result<f64> {
        if !exact.is_computed() {
            return Err(Error::NotComputed);
        }
        if exact.len() != self.len() {
            return Err(Error::SizeMismatch {
                expected: exact.len(),
                actual: self.len(),
            });
        }
        let pairs = (0..self.len()).map(|i| (exact.neighbors(i), self.neighbors(i)));
        Ok(metrics::mean_recall(pairs))
    }

    /// Converts into an exact engine that derives the usual statistics.
    ///
    /// The engine has no distance matrix; attach one with
    /// [`NeighborSetEngine::with_distance_matrix`] to run tabu updates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SizeMismatch`] if `labels` covers a different `n`.
    pub fn into_engine(self, labels: Labels) -> Result<NeighborSetEngine> {
        NeighborSetEngine::from_neighbor_sets(labels, self.sets, self.k)
    }
}

/// Divide-and-conquer approximate k-NN graph construction.
#[derive(Debug, Clone, Default)]
pub struct ApproximateGraphBuilder {
    config: ApproximateConfig,
}

impl ApproximateGraphBuilder {
    /// Creates a builder.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for an invalid configuration.
    pub fn new(config: ApproximateConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Builder configuration.
    #[must_use]
    pub fn config(&self) -> &ApproximateConfig {
        &self.config
    }

    /// Builds the approximate k-NN graph of `dataset`.
    ///
    /// The partition is processed depth-first on the calling thread; every
    /// distance goes through one [`DistanceCache`].
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyDataset`] for an empty dataset.
    /// - [`Error::InvalidK`] if `k == 0` or `k >= n`.
    pub fn build<D, O>(&self, dataset: &D, oracle: &O, k: usize) -> Result<ApproximateKnnGraph>
    where
        D: Dataset + ?Sized,
        O: DistanceOracle + ?Sized,
    {
        let n = dataset.len();
        if n == 0 {
            return Err(Error::EmptyDataset);
        }
        if k == 0 || k >= n {
            return Err(Error::invalid_k(
                k,
                format!("must be in [1, {}]", n.saturating_sub(1)),
            ));
        }

        let threshold = self.config.division_threshold_for(k);
        let krylov = self.config.krylov();
        let mut cache = DistanceCache::new(dataset, oracle);
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut tree = PartitionTree::new((0..n).collect(), k);
        let mut stats = BuildStats::default();

        let mut stack = vec![tree.root()];
        while let Some(id) = stack.pop() {
            let indices = tree.indices(id).to_vec();
            if indices.len() <= threshold {
                stats.leaves += 1;
                let sets = exact_subset(&mut cache, &indices, k);
                tree.complete(id, sets);
                continue;
            }

            let centroid = Cluster::from_indices(dataset, indices.clone()).centroid();
            let values = dominant_projection(dataset, &indices, &centroid, krylov, &mut rng);
            let split = split_by_projection(&indices, &values, self.config.overlap_ratio);
            stats.splits += 1;
            stats.median_fallbacks += usize::from(split.median_fallback);
            tracing::trace!(
                size = indices.len(),
                left = split.left.len(),
                right = split.right.len(),
                middle = split.middle.len(),
                threshold = split.threshold,
                "Subset bisected"
            );

            let children = tree.split(id, split);
            stack.extend(children.middle);
            stack.push(children.right);
            stack.push(children.left);
        }
        stats.peak_live_nodes = tree.peak_live();

        let mut sets = tree
            .take_root_sets()
            .unwrap_or_else(|| (0..n).map(|_| NeighborSet::with_capacity(k)).collect());
        for _ in 0..self.config.refinement_passes {
            stats.refined += refine(&mut cache, &mut sets);
        }
        stats.completed = complete(&mut cache, &mut sets, k);
        stats.cache_hits = cache.hits();

        let report = cache.report();
        let all_pairs = n * (n - 1) / 2;
        tracing::info!(
            n,
            k,
            leaves = stats.leaves,
            splits = stats.splits,
            nodes = tree.created(),
            pairs = report.pairs,
            all_pairs,
            failed = report.failed_pairs,
            "Approximate k-NN graph built"
        );
        Ok(ApproximateKnnGraph {
            k,
            sets,
            report,
            stats,
        })
    }

    /// Builds the graph and converts it into an engine labelled from `dataset`.
    ///
    /// # Errors
    ///
    /// Same as [`ApproximateGraphBuilder::build`].
    pub fn build_engine<D, O>(&self, dataset: &D, oracle: &O, k: usize) -> Result<NeighborSetEngine>
    where
        D: Dataset + ?Sized,
        O: DistanceOracle + ?Sized,
    {
        self.build(dataset, oracle, k)?
            .into_engine(Labels::from_dataset(dataset))
    }
}

/// Exact k-NN sets of a subset, reading distances through the cache.
fn exact_subset<D, O>(cache: &mut DistanceCache<'_, D, O>, indices: &[usize], k: usize) -> Vec<NeighborSet>
where
    D: Dataset + ?Sized,
    O: DistanceOracle + ?Sized,
{
    let local = DistanceMatrix::from_fn(indices.len(), |a, b| cache.distance(indices[a], indices[b]));
    search::symmetric_neighbor_sets(&local, k)
        .into_iter()
        .map(|set| set.map_indices(|l| indices[l]))
        .collect()
}

/// One neighbor-of-neighbor pass; returns the number of insertions.
fn refine<D, O>(cache: &mut DistanceCache<'_, D, O>, sets: &mut [NeighborSet]) -> usize
where
    D: Dataset + ?Sized,
    O: DistanceOracle + ?Sized,
{
    let snapshot: Vec<Vec<usize>> = sets.iter().map(|s| s.indices().to_vec()).collect();
    let mut candidates = Vec::new();
    let mut inserted = 0;
    for (i, set) in sets.iter_mut().enumerate() {
        candidates.clear();
        for &j in &snapshot[i] {
            candidates.extend(snapshot[j].iter().copied().filter(|&c| c != i));
        }
        candidates.sort_unstable();
        candidates.dedup();
        for &c in &candidates {
            if set.contains(c) {
                continue;
            }
            if set.insert(c, cache.distance(i, c)) {
                inserted += 1;
            }
        }
    }
    tracing::debug!(inserted, "Refinement pass finished");
    inserted
}

/// Fills every set shorter than `k` by scanning the remaining instances.
fn complete<D, O>(cache: &mut DistanceCache<'_, D, O>, sets: &mut [NeighborSet], k: usize) -> usize
where
    D: Dataset + ?Sized,
    O: DistanceOracle + ?Sized,
{
    let n = sets.len();
    let mut completed = 0;
    for (i, set) in sets.iter_mut().enumerate() {
        if set.len() < k {
            set.fill_from_gaps(i, n, None, |j| cache.distance(i, j));
            completed += 1;
        }
    }
    completed
}
