//! Local Intrinsic Dimensionality (LID) from stored neighbor distances.
//!
//! Hubness grows with intrinsic rather than embedding dimensionality, so the
//! per-point LID is a useful companion to occurrence statistics. The MLE
//! estimator (Amsaleg et al., 2015) over the k nearest distances is
//!
//! ```text
//! LID(x) = -k / Σᵢ ln(dᵢ / dₖ)
//! ```

use super::NeighborSetEngine;
use crate::error::Result;

/// LID estimation parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LidConfig {
    /// Relative floor applied to distances to avoid `ln(0)`.
    pub epsilon: f32,
}

impl Default for LidConfig {
    fn default() -> Self {
        Self { epsilon: 1e-10 }
    }
}

/// MLE estimate from ascending distances.
///
/// Returns NaN for fewer than two distances and infinity when all distances
/// are equal.
#[must_use]
pub(crate) fn estimate_mle(sorted: &[f32], config: LidConfig) -> f32 {
    if sorted.len() < 2 {
        return f32::NAN;
    }
    let floor = sorted[sorted.len() - 1] * config.epsilon;
    let d_k = sorted[sorted.len() - 1].max(floor);

    let (sum, count) = sorted.iter().fold((0.0f32, 0usize), |(s, c), &d| {
        let ratio = d.max(floor) / d_k;
        if ratio > 0.0 && ratio < 1.0 {
            (s + ratio.ln(), c + 1)
        } else {
            (s, c)
        }
    });

    if count > 0 && sum.abs() > floor {
        -(count as f32) / sum
    } else {
        f32::INFINITY
    }
}

impl NeighborSetEngine {
    /// LID estimate of every instance from its active neighbor distances.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotComputed`](crate::Error::NotComputed) before the
    /// sets are computed.
    pub fn local_intrinsic_dimensionality(&self, config: LidConfig) -> Result<Vec<f32>> {
        self.ensure_computed()?;
        Ok((0..self.len())
            .map(|i| estimate_mle(self.neighbor_distances(i), config))
            .collect())
    }
}
