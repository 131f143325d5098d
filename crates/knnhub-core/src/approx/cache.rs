//! Lazily filled pairwise distance cache.
//!
//! Overlapping subtrees of the partition share most of their pairs, so every
//! distance the builder needs goes through one cache: upper-triangular
//! values plus a parallel computed flag per pair. Writes need `&mut self`,
//! which keeps the depth-first recursion the only writer.

use crate::dataset::Dataset;
use crate::distance::DistanceOracle;
use crate::matrix::{checked_distance, ComputeReport};

/// Distances computed on demand, each pair at most once.
pub struct DistanceCache<'a, D: ?Sized, O: ?Sized> {
    dataset: &'a D,
    oracle: &'a O,
    n: usize,
    values: Vec<f32>,
    computed: Vec<bool>,
    report: ComputeReport,
    hits: usize,
}

impl<D: ?Sized, O: ?Sized> std::fmt::Debug for DistanceCache<'_, D, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistanceCache")
            .field("n", &self.n)
            .field("report", &self.report)
            .field("hits", &self.hits)
            .finish_non_exhaustive()
    }
}

impl<'a, D, O> DistanceCache<'a, D, O>
where
    D: Dataset + ?Sized,
    O: DistanceOracle + ?Sized,
{
    /// Creates an empty cache over every pair of `dataset`.
    pub fn new(dataset: &'a D, oracle: &'a O) -> Self {
        let n = dataset.len();
        let pairs = n * n.saturating_sub(1) / 2;
        Self {
            dataset,
            oracle,
            n,
            values: vec![0.0; pairs],
            computed: vec![false; pairs],
            report: ComputeReport::default(),
            hits: 0,
        }
    }

    /// Flat offset of the pair `i < j`.
    #[inline]
    fn offset(&self, i: usize, j: usize) -> usize {
        debug_assert!(i < j && j < self.n);
        i * (2 * self.n - i - 1) / 2 + (j - i - 1)
    }

    /// Distance between `i` and `j`, computing it on first use.
    ///
    /// A failed pair is cached as `f32::INFINITY` and never retried.
    pub fn distance(&mut self, i: usize, j: usize) -> f32 {
        if i == j {
            return 0.0;
        }
        let (lo, hi) = if i < j { (i, j) } else { (j, i) };
        let at = self.offset(lo, hi);
        if self.computed[at] {
            self.hits += 1;
            return self.values[at];
        }
        let value = checked_distance(
            self.oracle,
            self.dataset.instance(lo),
            self.dataset.instance(hi),
            (lo, hi),
            &mut self.report,
        )
        .unwrap_or(f32::INFINITY);
        self.values[at] = value;
        self.computed[at] = true;
        value
    }

    /// Returns true if the pair has been evaluated.
    #[must_use]
    pub fn is_computed(&self, i: usize, j: usize) -> bool {
        if i == j {
            return true;
        }
        let (lo, hi) = if i < j { (i, j) } else { (j, i) };
        self.computed[self.offset(lo, hi)]
    }

    /// Oracle calls made so far.
    #[must_use]
    pub fn report(&self) -> ComputeReport {
        self.report
    }

    /// Lookups answered without calling the oracle.
    #[must_use]
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Number of instances covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.n
    }

    /// Returns true if the cache covers no instances.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DenseDataset;
    use crate::distance::{DistanceError, DistanceMetric};

    fn line() -> DenseDataset {
        DenseDataset::unlabeled(vec![vec![0.0], vec![1.0], vec![3.0], vec![7.0]]).unwrap()
    }

    #[test]
    fn test_each_pair_computed_once() {
        let dataset = line();
        let mut cache = DistanceCache::new(&dataset, &DistanceMetric::Euclidean);

        assert!(!cache.is_computed(1, 3));
        assert_eq!(cache.distance(3, 1), 6.0);
        assert_eq!(cache.distance(1, 3), 6.0);
        assert_eq!(cache.distance(2, 2), 0.0);

        assert!(cache.is_computed(1, 3));
        assert_eq!(cache.report().pairs, 1);
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn test_offsets_cover_all_pairs() {
        let dataset = line();
        let mut cache = DistanceCache::new(&dataset, &DistanceMetric::Euclidean);

        for i in 0..4 {
            for j in (i + 1)..4 {
                let expected = (dataset.instance(i)[0] - dataset.instance(j)[0]).abs();
                assert_eq!(cache.distance(i, j), expected);
            }
        }
        assert_eq!(cache.report().pairs, 6);
        assert_eq!(cache.hits(), 0);
    }

    #[test]
    fn test_failed_pair_is_cached_as_infinity() {
        let dataset = line();
        let oracle = |a: &[f32], b: &[f32]| -> Result<f32, DistanceError> {
            if a[0] == 0.0 || b[0] == 0.0 {
                Err(DistanceError::Other("unreachable".into()))
            } else {
                Ok((a[0] - b[0]).abs())
            }
        };
        let mut cache = DistanceCache::new(&dataset, &oracle);

        assert!(cache.distance(0, 2).is_infinite());
        assert!(cache.distance(2, 0).is_infinite());

        assert_eq!(cache.report().failed_pairs, 1);
        assert_eq!(cache.report().pairs, 1);
    }
}
