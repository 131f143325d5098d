//! Upper-triangular distance matrix.
//!
//! Row `i` stores the distances from `i` to every `j > i`, at offset
//! `j - i - 1`. The diagonal is implicit (zero). A pair whose distance could
//! not be computed is stored as `f32::INFINITY` and never becomes a neighbor.

use crate::dataset::Dataset;
use crate::distance::DistanceOracle;
use crate::error::{Error, Result};
use crate::pool::RowPartitionPool;

/// Counts of a batch of oracle calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComputeReport {
    /// Distances requested from the oracle.
    pub pairs: usize,
    /// Requests that failed and were skipped.
    pub failed_pairs: usize,
}

impl ComputeReport {
    /// Adds another report's counts to this one.
    pub fn merge(&mut self, other: ComputeReport) {
        self.pairs += other.pairs;
        self.failed_pairs += other.failed_pairs;
    }

    /// Returns true if no pair failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed_pairs == 0
    }
}

/// Evaluates one pair, logging and converting a failure into `None`.
pub(crate) fn checked_distance<O: DistanceOracle + ?Sized>(
    oracle: &O,
    a: &[f32],
    b: &[f32],
    (i, j): (usize, usize),
    report: &mut ComputeReport,
) -> Option<f32> {
    report.pairs += 1;
    match oracle.distance(a, b) {
        Ok(d) => Some(d),
        Err(e) => {
            report.failed_pairs += 1;
            tracing::warn!(i, j, error = %e, "Distance computation failed, pair skipped");
            None
        }
    }
}

/// Symmetric pairwise distances in upper-triangular storage.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    rows: Vec<Vec<f32>>,
}

impl DistanceMatrix {
    /// Wraps precomputed upper-triangular rows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if row `i` does not have
    /// `n - i - 1` entries or holds a negative or NaN value.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self> {
        let n = rows.len();
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n - i - 1 {
                return Err(Error::InvalidParameter(format!(
                    "distance row {i} has {} entries, expected {}",
                    row.len(),
                    n - i - 1
                )));
            }
            if let Some(bad) = row.iter().find(|d| d.is_nan() || **d < 0.0) {
                return Err(Error::InvalidParameter(format!(
                    "distance row {i} holds invalid value {bad}"
                )));
            }
        }
        Ok(Self { rows })
    }

    /// Builds an `n x n` matrix from an infallible pair function.
    #[must_use]
    pub fn from_fn(n: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let rows = (0..n)
            .map(|i| ((i + 1)..n).map(|j| f(i, j)).collect())
            .collect();
        Self { rows }
    }

    /// Computes all pairwise distances of `dataset` on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyDataset`] for an empty dataset. Oracle failures
    /// are not errors; they are counted in the report.
    pub fn compute<D, O>(dataset: &D, oracle: &O) -> Result<(Self, ComputeReport)>
    where
        D: Dataset + ?Sized,
        O: DistanceOracle + ?Sized,
    {
        let n = dataset.len();
        if n == 0 {
            return Err(Error::EmptyDataset);
        }
        let mut report = ComputeReport::default();
        let mut rows = Vec::with_capacity(n);
        for i in 0..n {
            rows.push(distance_row(dataset, oracle, i, &mut report));
        }
        tracing::debug!(n, failed = report.failed_pairs, "Distance matrix computed");
        Ok((Self { rows }, report))
    }

    /// Computes all pairwise distances with one worker per contiguous row range.
    ///
    /// Produces the same matrix as [`DistanceMatrix::compute`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyDataset`] for an empty dataset.
    pub fn compute_parallel<D, O>(
        dataset: &D,
        oracle: &O,
        pool: &RowPartitionPool,
    ) -> Result<(Self, ComputeReport)>
    where
        D: Dataset + ?Sized,
        O: DistanceOracle + ?Sized,
    {
        let n = dataset.len();
        if n == 0 {
            return Err(Error::EmptyDataset);
        }
        let mut rows: Vec<(Vec<f32>, ComputeReport)> = vec![(Vec::new(), ComputeReport::default()); n];
        let pool_report = pool.for_each_rows(&mut rows, |range, chunk| {
            for (i, slot) in range.zip(chunk.iter_mut()) {
                let mut report = ComputeReport::default();
                slot.0 = distance_row(dataset, oracle, i, &mut report);
                slot.1 = report;
            }
            Ok(())
        });

        let mut report = ComputeReport::default();
        let mut out = Vec::with_capacity(n);
        for (i, (row, row_report)) in rows.into_iter().enumerate() {
            report.merge(row_report);
            if row.len() == n - i - 1 {
                out.push(row);
            } else {
                // Row of a failed partition.
                report.failed_pairs += n - i - 1;
                out.push(vec![f32::INFINITY; n - i - 1]);
            }
        }
        if !pool_report.is_complete() {
            tracing::warn!(
                failed_partitions = pool_report.failed_partitions,
                "Some distance rows could not be computed"
            );
        }
        Ok((Self { rows: out }, report))
    }

    /// Number of instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the matrix covers no instances.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distance between `i` and `j` (zero when `i == j`).
    #[must_use]
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f32 {
        match i.cmp(&j) {
            std::cmp::Ordering::Less => self.rows[i][j - i - 1],
            std::cmp::Ordering::Greater => self.rows[j][i - j - 1],
            std::cmp::Ordering::Equal => 0.0,
        }
    }

    /// Overwrites the distance between `i != j`.
    pub fn set(&mut self, i: usize, j: usize, value: f32) {
        debug_assert!(i != j, "diagonal is implicit");
        let (lo, hi) = if i < j { (i, j) } else { (j, i) };
        self.rows[lo][hi - lo - 1] = value;
    }

    /// Stored upper-triangular row `i` (distances to `i+1..n`).
    #[must_use]
    pub fn row(&self, i: usize) -> &[f32] {
        &self.rows[i]
    }

    /// Distances from `i` to every instance, including the zero at `i`.
    #[must_use]
    pub fn full_row(&self, i: usize) -> Vec<f32> {
        (0..self.len()).map(|j| self.get(i, j)).collect()
    }

    /// Restricts the matrix to `indices`, in order.
    #[must_use]
    pub fn select(&self, indices: &[usize]) -> Self {
        Self::from_fn(indices.len(), |a, b| self.get(indices[a], indices[b]))
    }
}

fn distance_row<D, O>(dataset: &D, oracle: &O, i: usize, report: &mut ComputeReport) -> Vec<f32>
where
    D: Dataset + ?Sized,
    O: DistanceOracle + ?Sized,
{
    let a = dataset.instance(i);
    ((i + 1)..dataset.len())
        .map(|j| {
            checked_distance(oracle, a, dataset.instance(j), (i, j), report)
                .unwrap_or(f32::INFINITY)
        })
        .collect()
}
