//! Brute-force k-NN search over a distance matrix or an oracle.
//!
//! Two batch algorithms produce identical neighbor sets:
//!
//! - [`symmetric_neighbor_sets`] visits every unordered pair once and offers
//!   it to both endpoints (half the comparisons, single writer).
//! - [`row_neighbor_sets`] scans full distance rows for a range of owners,
//!   so a worker only ever writes its own rows.
//!
//! In both, instance `i` sees its candidates in increasing index order, which
//! together with [`NeighborSet::insert`] makes ties resolve to the lower index.
//!
//! The single-query functions are the bounded searches used by the
//! shared-neighbor engine and by callers with unindexed queries.

use super::neighbor_set::{NeighborSet, TabuSet};
use crate::dataset::Dataset;
use crate::distance::DistanceOracle;
use crate::error::{Error, Result};
use crate::matrix::{checked_distance, ComputeReport, DistanceMatrix};
use std::ops::Range;

/// k-NN sets of every instance, one pass over the unordered pairs.
#[must_use]
pub fn symmetric_neighbor_sets(matrix: &DistanceMatrix, k: usize) -> Vec<NeighborSet> {
    let n = matrix.len();
    let mut sets: Vec<NeighborSet> = (0..n).map(|_| NeighborSet::with_capacity(k)).collect();
    for i in 0..n {
        for (offset, &d) in matrix.row(i).iter().enumerate() {
            let j = i + offset + 1;
            sets[i].insert(j, d);
            sets[j].insert(i, d);
        }
    }
    sets
}

/// k-NN sets of the owners in `rows`, each from a full row scan.
#[must_use]
pub fn row_neighbor_sets(matrix: &DistanceMatrix, rows: Range<usize>, k: usize) -> Vec<NeighborSet> {
    rows.map(|i| row_neighbor_set(matrix, i, k, None)).collect()
}

fn row_neighbor_set(matrix: &DistanceMatrix, i: usize, k: usize, tabu: Option<&TabuSet>) -> NeighborSet {
    let mut set = NeighborSet::with_capacity(k);
    for j in 0..matrix.len() {
        if j == i || tabu.is_some_and(|t| t.contains(&j)) {
            continue;
        }
        set.insert(j, matrix.get(i, j));
    }
    set
}

fn check_query_k(k: usize, candidates: usize) -> Result<()> {
    if k == 0 {
        return Err(Error::invalid_k(k, "must be at least 1"));
    }
    if candidates == 0 {
        return Err(Error::EmptyDataset);
    }
    if k > candidates {
        return Err(Error::invalid_k(
            k,
            format!("only {candidates} candidates available"),
        ));
    }
    Ok(())
}

/// k nearest instances of `dataset` to an external `query` vector.
///
/// # Errors
///
/// - [`Error::InvalidK`] if `k == 0` or `k` exceeds the dataset size.
/// - [`Error::EmptyDataset`] if the dataset is empty.
///
/// Failed oracle calls are skipped and counted in the report.
pub fn nearest_in_dataset<D, O>(
    dataset: &D,
    oracle: &O,
    query: &[f32],
    k: usize,
    tabu: Option<&TabuSet>,
) -> Result<(NeighborSet, ComputeReport)>
where
    D: Dataset + ?Sized,
    O: DistanceOracle + ?Sized,
{
    check_query_k(k, dataset.len())?;
    let mut report = ComputeReport::default();
    let mut set = NeighborSet::with_capacity(k);
    for j in 0..dataset.len() {
        if tabu.is_some_and(|t| t.contains(&j)) {
            continue;
        }
        if let Some(d) = checked_distance(oracle, query, dataset.instance(j), (usize::MAX, j), &mut report) {
            set.insert(j, d);
        }
    }
    Ok((set, report))
}

/// k nearest entries of a precomputed distance row (`row[j]` = distance to `j`).
///
/// # Errors
///
/// Returns [`Error::InvalidK`] if `k == 0` or `k > row.len()`.
pub fn nearest_from_row(row: &[f32], k: usize, tabu: Option<&TabuSet>) -> Result<NeighborSet> {
    check_query_k(k, row.len())?;
    let mut set = NeighborSet::with_capacity(k);
    for (j, &d) in row.iter().enumerate() {
        if tabu.is_some_and(|t| t.contains(&j)) {
            continue;
        }
        set.insert(j, d);
    }
    Ok(set)
}

/// k nearest other instances of instance `index` in a distance matrix.
///
/// # Errors
///
/// - [`Error::IndexOutOfRange`] if `index >= matrix.len()`.
/// - [`Error::InvalidK`] if `k == 0` or `k >= matrix.len()`.
pub fn nearest_in_matrix(
    matrix: &DistanceMatrix,
    index: usize,
    k: usize,
    tabu: Option<&TabuSet>,
) -> Result<NeighborSet> {
    if index >= matrix.len() {
        return Err(Error::IndexOutOfRange {
            index,
            len: matrix.len(),
        });
    }
    check_query_k(k, matrix.len() - 1)?;
    Ok(row_neighbor_set(matrix, index, k, tabu))
}
