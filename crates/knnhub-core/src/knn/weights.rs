//! Instance weighting schemes derived from hubness statistics.
//!
//! Each scheme returns one weight per instance at the active k and reads
//! its moments from [`HubnessStats`](super::HubnessStats).

use super::NeighborSetEngine;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Parameters shared by the bounded and entropy-based schemes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightParams {
    /// Lower clamp of the good-minus-bad schemes.
    pub lower_bound: f32,
    /// Upper clamp of the good-minus-bad schemes.
    pub upper_bound: f32,
    /// Additive offset of the reverse-entropy term.
    pub theta: f32,
    /// Clip bad-hubness weights at 1.
    pub cap_bad_weight: bool,
}

impl Default for WeightParams {
    fn default() -> Self {
        Self {
            lower_bound: 0.0,
            upper_bound: 10.0,
            theta: 0.0,
            cap_bad_weight: true,
        }
    }
}

/// Whether frequent neighbors are down- or up-weighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubnessDirection {
    /// `exp(-z)`: hubs get small weights.
    Penalize,
    /// `exp(z)`: hubs get large weights.
    Reward,
}

impl NeighborSetEngine {
    /// `exp(∓ (N_k(x) - mean) / stdev)` per instance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotComputed`] before the sets are computed.
    pub fn hubness_weights(&self, direction: HubnessDirection) -> Result<Vec<f32>> {
        self.ensure_computed()?;
        let sign = match direction {
            HubnessDirection::Penalize => -1.0,
            HubnessDirection::Reward => 1.0,
        };
        let moments = self.stats.total;
        Ok(self
            .occurrences
            .total
            .iter()
            .map(|&t| (sign * moments.standardize(t as f32)).exp())
            .collect())
    }

    /// Bad-hubness weights (HW-kNN): `exp(-(bad - mean) / stdev)`.
    ///
    /// With `cap`, weights above 1 are clipped to 1 so only bad hubs are
    /// penalized.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotComputed`] before the sets are computed.
    pub fn bad_hubness_weights(&self, cap: bool) -> Result<Vec<f32>> {
        self.ensure_computed()?;
        let moments = self.stats.bad;
        Ok(self
            .occurrences
            .bad
            .iter()
            .map(|&b| {
                let w = (-moments.standardize(b as f32)).exp();
                if cap {
                    w.min(1.0)
                } else {
                    w
                }
            })
            .collect())
    }

    /// `clamp(exp(((good - bad) - mean) / stdev), lower, upper)`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotComputed`] before the sets are computed.
    /// - [`Error::InvalidParameter`] if `lower > upper`.
    pub fn good_minus_bad_weights(&self, lower: f32, upper: f32) -> Result<Vec<f32>> {
        self.ensure_computed()?;
        check_bounds(lower, upper)?;
        let moments = self.stats.good_minus_bad;
        let occ = &self.occurrences;
        Ok(occ
            .good
            .iter()
            .zip(&occ.bad)
            .map(|(&g, &b)| {
                let gmb = g as f32 - b as f32;
                moments.standardize(gmb).exp().clamp(lower, upper)
            })
            .collect())
    }

    /// Like [`NeighborSetEngine::good_minus_bad_weights`] on `(good - bad) / N_k(x)`.
    ///
    /// Instances that never occur get weight 1.
    ///
    /// # Errors
    ///
    /// - [`Error::NotComputed`] before the sets are computed.
    /// - [`Error::InvalidParameter`] if `lower > upper`.
    pub fn relative_good_minus_bad_weights(&self, lower: f32, upper: f32) -> Result<Vec<f32>> {
        self.ensure_computed()?;
        check_bounds(lower, upper)?;
        let moments = self.stats.relative_good_minus_bad;
        let occ = &self.occurrences;
        Ok((0..self.len())
            .map(|i| {
                if occ.total[i] == 0 {
                    return 1.0;
                }
                let relative = (occ.good[i] as f32 - occ.bad[i] as f32) / occ.total[i] as f32;
                moments.standardize(relative).exp().clamp(lower, upper)
            })
            .collect())
    }

    /// Simhub weights: `log2(n / (N_k(x) + 1)) * (max_entropy - H_rev(x) + theta)`.
    ///
    /// The first factor rewards rarely occurring points, the second points
    /// whose reverse neighbors agree on a label. Weights are divided by the
    /// largest absolute weight.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotComputed`] before the sets are computed.
    pub fn simhub_weights(&self, theta: f32) -> Result<Vec<f32>> {
        let reverse_entropies = self.reverse_neighbor_entropies(None)?;
        let n = self.len() as f32;
        let max_entropy = self.max_entropy();
        let mut weights: Vec<f32> = self
            .occurrences
            .total
            .iter()
            .zip(&reverse_entropies)
            .map(|(&t, &h)| (n / (t as f32 + 1.0)).log2() * (max_entropy - h + theta))
            .collect();
        normalize_by_max_abs(&mut weights);
        Ok(weights)
    }
}

fn check_bounds(lower: f32, upper: f32) -> Result<()> {
    if lower > upper || lower.is_nan() || upper.is_nan() {
        return Err(Error::InvalidParameter(format!(
            "weight bounds [{lower}, {upper}] are empty"
        )));
    }
    Ok(())
}

/// Divides by the largest absolute value; leaves an all-zero vector unchanged.
pub(crate) fn normalize_by_max_abs(values: &mut [f32]) {
    let max = values.iter().fold(0.0f32, |m, v| m.max(v.abs()));
    if max > 0.0 {
        values.iter_mut().for_each(|v| *v /= max);
    }
}
