//! Incremental exclusion (tabu) and completion of neighbor sets.
//!
//! Excluding an instance repairs only the sets that contained it. The
//! replacement search scans the index intervals between the neighbors a set
//! already knows, so the distances it evaluates are exactly the ones a full
//! search would need beyond the surviving entries.

use super::neighbor_set::TabuSet;
use super::NeighborSetEngine;
use crate::error::{Error, Result};
use std::sync::Arc;

impl NeighborSetEngine {
    /// Removes `index` from every neighbor set and repairs the affected sets.
    ///
    /// Each affected set shifts left and receives the nearest candidate that
    /// is neither tabu nor already known. `index` is added to `tabu` and its
    /// own set is cleared. Occurrence counts and reverse sets are updated in
    /// place; the aggregate statistics only when `recompute_stats` is set.
    ///
    /// Returns the number of repaired sets.
    ///
    /// # Errors
    ///
    /// - [`Error::NotComputed`] before the sets are computed.
    /// - [`Error::IndexOutOfRange`] if `index >= n`.
    /// - [`Error::MissingDistanceMatrix`] if no matrix is attached.
    pub fn tabu_neighbor(
        &mut self,
        index: usize,
        tabu: &mut TabuSet,
        recompute_stats: bool,
    ) -> Result<usize> {
        self.ensure_computed()?;
        let n = self.len();
        if index >= n {
            return Err(Error::IndexOutOfRange { index, len: n });
        }
        let matrix = Arc::clone(self.matrix("tabu_neighbor")?);
        tabu.insert(index);
        let tabu: &TabuSet = tabu;

        let mut repaired = 0usize;
        for owner in 0..n {
            if owner == index || !self.sets[owner].contains(index) {
                continue;
            }
            let before = self.active_prefix(owner);
            let set = &mut self.sets[owner];
            set.remove(index);
            set.fill_from_gaps(owner, n, Some(tabu), |j| matrix.get(owner, j));
            let after = self.active_prefix(owner);
            self.apply_prefix_change(owner, &before, &after);
            repaired += 1;
        }

        let before = self.active_prefix(index);
        self.sets[index].clear();
        self.apply_prefix_change(index, &before, &[]);

        if recompute_stats {
            self.refresh_stats();
        }
        tracing::debug!(index, repaired, tabu = tabu.len(), "Instance excluded from neighbor sets");
        Ok(repaired)
    }

    /// Extends every set shorter than `k` back up to `k` neighbors.
    ///
    /// Capacity grows when `k` exceeds the stored width. Owners in `tabu` are
    /// not completed and tabu candidates are never added. Statistics are
    /// rebuilt at `k`, which becomes the active k.
    ///
    /// Returns the number of completed sets.
    ///
    /// # Errors
    ///
    /// - [`Error::NotComputed`] before the sets are computed.
    /// - [`Error::InvalidK`] if `k == 0` or `k >= n`.
    /// - [`Error::MissingDistanceMatrix`] if no matrix is attached.
    pub fn complete_neighbor_sets(&mut self, k: usize, tabu: Option<&TabuSet>) -> Result<usize> {
        self.ensure_computed()?;
        self.check_k(k)?;
        let matrix = Arc::clone(self.matrix("complete_neighbor_sets")?);
        let n = self.len();
        let width = k.max(self.stored_k);

        let mut completed = 0usize;
        for (owner, set) in self.sets.iter_mut().enumerate() {
            set.grow(width);
            if set.len() >= k || tabu.is_some_and(|t| t.contains(&owner)) {
                continue;
            }
            set.fill_from_gaps(owner, n, tabu, |j| matrix.get(owner, j));
            completed += 1;
        }

        self.stored_k = width;
        self.rebuild_statistics(k);
        tracing::debug!(k, completed, "Neighbor sets completed");
        Ok(completed)
    }

    fn active_prefix(&self, owner: usize) -> Vec<usize> {
        self.neighbors(owner).to_vec()
    }

    /// Moves occurrence counts and reverse entries from `before` to `after`.
    fn apply_prefix_change(&mut self, owner: usize, before: &[usize], after: &[usize]) {
        for &neighbor in before.iter().filter(|j| !after.contains(j)) {
            self.occurrences.remove(owner, neighbor, &self.labels);
            let owners = &mut self.reverse[neighbor];
            if let Ok(pos) = owners.binary_search(&owner) {
                owners.remove(pos);
            }
        }
        for &neighbor in after.iter().filter(|j| !before.contains(j)) {
            self.occurrences.add(owner, neighbor, &self.labels);
            let owners = &mut self.reverse[neighbor];
            if let Err(pos) = owners.binary_search(&owner) {
                owners.insert(pos, owner);
            }
        }
    }
}
