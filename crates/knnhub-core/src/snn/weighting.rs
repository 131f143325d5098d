//! Instance weights for weighted shared-neighbor counts.

use crate::error::Result;
use crate::knn::{HubnessDirection, NeighborSetEngine, WeightParams};
use serde::{Deserialize, Serialize};

/// How each shared neighbor contributes to a count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceWeighting {
    /// Every shared neighbor counts 1.
    #[default]
    Unweighted,
    /// `exp(-z)` of the occurrence frequency: hubs count less.
    HubPenalizing,
    /// Simhub: rare neighbors with a pure reverse neighborhood count more.
    HubnessInformation,
    /// Good/bad hubness, class rarity and reverse-entropy profile combined.
    ImbalanceAware,
    /// HW-kNN bad-hubness weights, capped at 1 when `cap_bad_weight` is set.
    BadHubness,
    /// Good-minus-bad occurrence, clamped to `[lower_bound, upper_bound]`.
    GoodMinusBad,
    /// Good-minus-bad relative to the occurrence count, clamped likewise.
    RelativeGoodMinusBad,
}

impl InstanceWeighting {
    /// One weight per instance of `engine`, or `None` when unweighted.
    ///
    /// # Errors
    ///
    /// - [`Error::NotComputed`](crate::Error::NotComputed) before the
    ///   engine's sets are computed.
    /// - [`Error::InvalidParameter`](crate::Error::InvalidParameter) if a
    ///   clamped scheme gets empty bounds.
    pub fn weights(self, engine: &NeighborSetEngine, params: &WeightParams) -> Result<Option<Vec<f32>>> {
        let weights = match self {
            Self::Unweighted => return Ok(None),
            Self::HubPenalizing => engine.hubness_weights(HubnessDirection::Penalize)?,
            Self::HubnessInformation => engine.simhub_weights(params.theta)?,
            Self::ImbalanceAware => imbalance_aware_weights(engine, params.theta)?,
            Self::BadHubness => engine.bad_hubness_weights(params.cap_bad_weight)?,
            Self::GoodMinusBad => engine.good_minus_bad_weights(params.lower_bound, params.upper_bound)?,
            Self::RelativeGoodMinusBad => {
                engine.relative_good_minus_bad_weights(params.lower_bound, params.upper_bound)?
            }
        };
        tracing::debug!(scheme = ?self, n = weights.len(), "Computed instance weights");
        Ok(Some(weights))
    }
}

/// `logistic(z_good - z_bad) * (p_min / p_class) * (E_max - H_rev + theta) / (E_max + theta)`.
///
/// The last factor is 1 when its denominator vanishes (single class,
/// `theta = 0`).
pub(crate) fn imbalance_aware_weights(engine: &NeighborSetEngine, theta: f32) -> Result<Vec<f32>> {
    let reverse_entropies = engine.reverse_neighbor_entropies(None)?;
    let stats = engine.stats();
    let occ = engine.occurrences();
    let labels = engine.labels();

    let priors = labels.class_priors();
    let min_prior = priors
        .iter()
        .copied()
        .filter(|&p| p > 0.0)
        .fold(f32::INFINITY, f32::min);
    let max_entropy = engine.max_entropy();
    let entropy_scale = max_entropy + theta;

    Ok((0..engine.len())
        .map(|i| {
            let z_good = stats.good.standardize(occ.good[i] as f32);
            let z_bad = stats.bad.standardize(occ.bad[i] as f32);
            let hubness = logistic(z_good - z_bad);

            let prior = priors[labels.get(i)];
            let relevance = if prior > 0.0 { min_prior / prior } else { 1.0 };

            let profile = if entropy_scale > 0.0 {
                (max_entropy - reverse_entropies[i] + theta) / entropy_scale
            } else {
                1.0
            };
            hubness * relevance * profile
        })
        .collect())
}

#[inline]
fn logistic(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
