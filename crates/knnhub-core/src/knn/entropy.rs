//! Label entropies of neighbor and reverse-neighbor sets.

use super::NeighborSetEngine;
use crate::error::{Error, Result};

/// Shannon entropy (base 2) of a frequency histogram.
///
/// Zero-frequency classes are skipped. Returns 0 when the total mass is
/// zero or comes from a single observation.
#[must_use]
pub fn entropy_of_counts(counts: &[f32], observations: usize) -> f32 {
    if observations <= 1 {
        return 0.0;
    }
    let total: f32 = counts.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    counts
        .iter()
        .filter(|&&c| c > 0.0)
        .map(|&c| {
            let p = c / total;
            -p * p.log2()
        })
        .sum()
}

impl NeighborSetEngine {
    /// Label entropy of every instance's active k-NN set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotComputed`] before the sets are computed.
    pub fn neighbor_entropies(&self) -> Result<Vec<f32>> {
        self.ensure_computed()?;
        let c = self.labels.num_categories();
        let mut counts = vec![0.0f32; c];
        Ok((0..self.len())
            .map(|i| {
                counts.iter_mut().for_each(|x| *x = 0.0);
                let neighbors = self.neighbors(i);
                for &j in neighbors {
                    counts[self.labels.get(j)] += 1.0;
                }
                entropy_of_counts(&counts, neighbors.len())
            })
            .collect())
    }

    /// Label entropy of every instance's reverse neighbor set.
    ///
    /// With `class_weights`, each occurrence counts with the weight of the
    /// querying point's class instead of 1.
    ///
    /// # Errors
    ///
    /// - [`Error::NotComputed`] before the sets are computed.
    /// - [`Error::InvalidParameter`] if `class_weights` has the wrong length.
    pub fn reverse_neighbor_entropies(&self, class_weights: Option<&[f32]>) -> Result<Vec<f32>> {
        self.ensure_computed()?;
        let c = self.labels.num_categories();
        if let Some(w) = class_weights {
            if w.len() != c {
                return Err(Error::InvalidParameter(format!(
                    "{} class weights for {c} categories",
                    w.len()
                )));
            }
        }
        let mut counts = vec![0.0f32; c];
        Ok((0..self.len())
            .map(|i| {
                counts.iter_mut().for_each(|x| *x = 0.0);
                let owners = self.reverse_neighbors(i);
                for &j in owners {
                    let label = self.labels.get(j);
                    counts[label] += class_weights.map_or(1.0, |w| w[label]);
                }
                entropy_of_counts(&counts, owners.len())
            })
            .collect())
    }

    /// Largest possible label entropy, `log2(num_categories)`.
    #[must_use]
    pub fn max_entropy(&self) -> f32 {
        (self.labels.num_categories().max(1) as f32).log2()
    }
}
