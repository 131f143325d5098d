//! Bounded, sorted neighbor list.
//!
//! [`NeighborSet::insert`] is the insertion primitive every search in this
//! crate goes through. Entries stay ascending by distance; an equal distance
//! never displaces an existing entry, so when candidates are offered in
//! increasing index order, ties keep the lower index first.

use rustc_hash::FxHashSet;

/// Candidate indices excluded from neighbor search.
pub type TabuSet = FxHashSet<usize>;

/// Up to `capacity` `(index, distance)` pairs, ascending by distance.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NeighborSet {
    indices: Vec<usize>,
    distances: Vec<f32>,
    capacity: usize,
}

impl NeighborSet {
    /// Creates an empty set holding at most `k` neighbors.
    #[must_use]
    pub fn with_capacity(k: usize) -> Self {
        Self {
            indices: Vec::with_capacity(k),
            distances: Vec::with_capacity(k),
            capacity: k,
        }
    }

    /// Builds a set from already-sorted parts.
    ///
    /// Returns `None` if the parts differ in length, exceed `k`, are not
    /// ascending, or repeat an index.
    #[must_use]
    pub fn from_sorted(indices: Vec<usize>, distances: Vec<f32>, k: usize) -> Option<Self> {
        if indices.len() != distances.len() || indices.len() > k {
            return None;
        }
        if distances.windows(2).any(|w| w[0] > w[1] || w[0].is_nan()) {
            return None;
        }
        let mut seen = FxHashSet::default();
        if !indices.iter().all(|i| seen.insert(*i)) {
            return None;
        }
        Some(Self {
            indices,
            distances,
            capacity: k,
        })
    }

    /// Offers a candidate; returns true if it was kept.
    ///
    /// Non-finite distances (failed or unset pairs) are never kept. When the
    /// set is full the candidate must be strictly closer than the current
    /// worst, which is then discarded.
    pub fn insert(&mut self, index: usize, distance: f32) -> bool {
        if !distance.is_finite() || self.capacity == 0 {
            return false;
        }
        debug_assert!(
            !self.indices.contains(&index),
            "index {index} already in neighbor set"
        );
        if self.indices.len() == self.capacity {
            match self.distances.last() {
                Some(&worst) if distance < worst => {
                    self.indices.pop();
                    self.distances.pop();
                }
                _ => return false,
            }
        }
        let pos = self.distances.partition_point(|&d| d <= distance);
        self.indices.insert(pos, index);
        self.distances.insert(pos, distance);
        debug_assert!(self.indices.len() <= self.capacity);
        true
    }

    /// Removes `index` if present, shifting later entries left.
    ///
    /// Returns the position it occupied.
    pub fn remove(&mut self, index: usize) -> Option<usize> {
        let pos = self.position(index)?;
        self.indices.remove(pos);
        self.distances.remove(pos);
        Some(pos)
    }

    /// Position of `index` in the set.
    #[must_use]
    pub fn position(&self, index: usize) -> Option<usize> {
        self.indices.iter().position(|&i| i == index)
    }

    /// Returns true if `index` is one of the neighbors.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        self.indices.contains(&index)
    }

    /// Copy of the first `k` entries with capacity `k`.
    #[must_use]
    pub fn prefix(&self, k: usize) -> Self {
        let len = k.min(self.indices.len());
        Self {
            indices: self.indices[..len].to_vec(),
            distances: self.distances[..len].to_vec(),
            capacity: k,
        }
    }

    /// Same entries with every index passed through `f`.
    ///
    /// `f` must be injective; the distance order is unchanged.
    #[must_use]
    pub fn map_indices(&self, f: impl Fn(usize) -> usize) -> Self {
        Self {
            indices: self.indices.iter().map(|&i| f(i)).collect(),
            distances: self.distances.clone(),
            capacity: self.capacity,
        }
    }

    /// Raises the capacity to `k`; never shrinks.
    pub fn grow(&mut self, k: usize) {
        if k > self.capacity {
            self.capacity = k;
            self.indices.reserve(k - self.indices.len());
            self.distances.reserve(k - self.distances.len());
        }
    }

    /// Drops every entry, keeping the capacity.
    pub fn clear(&mut self) {
        self.indices.clear();
        self.distances.clear();
    }

    /// Number of neighbors currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Returns true if the set holds no neighbors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Returns true if the set holds `capacity` neighbors.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.indices.len() == self.capacity
    }

    /// Maximum number of neighbors.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Neighbor indices, nearest first.
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Neighbor distances, ascending.
    #[must_use]
    pub fn distances(&self) -> &[f32] {
        &self.distances
    }

    /// Distance of the farthest neighbor held.
    #[must_use]
    pub fn worst(&self) -> Option<f32> {
        self.distances.last().copied()
    }

    /// Iterates `(index, distance)` pairs, nearest first.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.indices.iter().copied().zip(self.distances.iter().copied())
    }

    /// Offers every index in `[0, n)` not already held, except `owner` and
    /// tabu indices, in increasing order.
    ///
    /// Only the integer intervals between the known (sorted) neighbor indices
    /// are scanned, so known neighbors are never re-evaluated. Because every
    /// non-member is lexicographically behind the members by
    /// `(distance, index)`, this yields the same set as a from-scratch search.
    pub fn fill_from_gaps<F>(&mut self, owner: usize, n: usize, tabu: Option<&TabuSet>, mut distance: F)
    where
        F: FnMut(usize) -> f32,
    {
        let mut known = self.indices.clone();
        known.sort_unstable();
        let mut start = 0;
        for bound in known.into_iter().chain(std::iter::once(n)) {
            for candidate in start..bound.min(n) {
                if candidate == owner || tabu.is_some_and(|t| t.contains(&candidate)) {
                    continue;
                }
                self.insert(candidate, distance(candidate));
            }
            start = bound + 1;
        }
    }
}
