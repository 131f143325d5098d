//! Occurrence (hubness) statistics.
//!
//! The occurrence frequency `N_k(x)` of an instance is the number of k-NN
//! sets it appears in. Splitting occurrences by whether the querying point
//! shares the neighbor's label gives good and bad hubness. Every weighting
//! scheme standardizes one of these distributions, so all of them read the
//! moments from a single [`hubness_stats`] call.

use super::neighbor_set::NeighborSet;
use crate::dataset::Labels;
use serde::{Deserialize, Serialize};

/// Per-instance occurrence counts at one neighborhood size.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Occurrences {
    /// Total occurrence frequency, `|reverse[i]|`.
    pub total: Vec<usize>,
    /// Occurrences in sets of same-label points.
    pub good: Vec<usize>,
    /// Occurrences in sets of other-label points.
    pub bad: Vec<usize>,
}

impl Occurrences {
    /// All-zero counts for `n` instances.
    #[must_use]
    pub fn zeros(n: usize) -> Self {
        Self {
            total: vec![0; n],
            good: vec![0; n],
            bad: vec![0; n],
        }
    }

    /// Records that `neighbor` occurs in the set of `owner`.
    #[inline]
    pub(crate) fn add(&mut self, owner: usize, neighbor: usize, labels: &Labels) {
        self.total[neighbor] += 1;
        if labels.get(owner) == labels.get(neighbor) {
            self.good[neighbor] += 1;
        } else {
            self.bad[neighbor] += 1;
        }
    }

    /// Reverts [`Occurrences::add`].
    #[inline]
    pub(crate) fn remove(&mut self, owner: usize, neighbor: usize, labels: &Labels) {
        debug_assert!(self.total[neighbor] > 0, "occurrence underflow at {neighbor}");
        self.total[neighbor] -= 1;
        if labels.get(owner) == labels.get(neighbor) {
            self.good[neighbor] -= 1;
        } else {
            self.bad[neighbor] -= 1;
        }
    }
}

/// Mean and population standard deviation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Moments {
    /// Arithmetic mean.
    pub mean: f32,
    /// Population standard deviation.
    pub stdev: f32,
}

impl Moments {
    /// Moments of a sample; zero for an empty one.
    #[must_use]
    pub fn of<I>(values: I) -> Self
    where
        I: IntoIterator<Item = f64>,
        I::IntoIter: Clone,
    {
        let iter = values.into_iter();
        let (sum, count) = iter.clone().fold((0.0f64, 0usize), |(s, c), v| (s + v, c + 1));
        if count == 0 {
            return Self::default();
        }
        let mean = sum / count as f64;
        let var = iter.map(|v| (v - mean) * (v - mean)).sum::<f64>() / count as f64;
        Self {
            mean: mean as f32,
            stdev: var.sqrt() as f32,
        }
    }

    /// z-score of `x`; 0 when the distribution has no spread.
    #[must_use]
    #[inline]
    pub fn standardize(&self, x: f32) -> f32 {
        if self.stdev > 0.0 {
            (x - self.mean) / self.stdev
        } else {
            0.0
        }
    }
}

/// Aggregate hubness statistics at one neighborhood size.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HubnessStats {
    /// Total occurrence frequency.
    pub total: Moments,
    /// Good occurrence frequency.
    pub good: Moments,
    /// Bad occurrence frequency.
    pub bad: Moments,
    /// `good - bad`.
    pub good_minus_bad: Moments,
    /// `(good - bad) / total`, over instances with at least one occurrence.
    pub relative_good_minus_bad: Moments,
    /// Skewness of the total occurrence distribution.
    pub skewness: f32,
    /// Excess kurtosis of the total occurrence distribution.
    pub kurtosis: f32,
    /// Instances that occur in no neighbor set.
    pub orphans: usize,
    /// Instances occurring more than two standard deviations above the mean.
    pub hubs: usize,
}

/// Computes every aggregate statistic from the per-instance counts.
#[must_use]
pub fn hubness_stats(good: &[usize], bad: &[usize], total: &[usize]) -> HubnessStats {
    debug_assert!(good.len() == bad.len() && bad.len() == total.len());

    let as_f64 = |v: &[usize]| v.iter().map(|&x| x as f64).collect::<Vec<_>>();
    let total_f = as_f64(total);
    let gmb: Vec<f64> = good
        .iter()
        .zip(bad)
        .map(|(&g, &b)| g as f64 - b as f64)
        .collect();
    let relative: Vec<f64> = gmb
        .iter()
        .zip(total)
        .filter(|(_, t)| **t > 0)
        .map(|(d, t)| d / *t as f64)
        .collect();

    let total_moments = Moments::of(total_f.iter().copied());
    let (skewness, kurtosis) = shape(&total_f, total_moments);
    let hub_threshold = total_moments.mean + 2.0 * total_moments.stdev;

    HubnessStats {
        total: total_moments,
        good: Moments::of(good.iter().map(|&x| x as f64)),
        bad: Moments::of(bad.iter().map(|&x| x as f64)),
        good_minus_bad: Moments::of(gmb.iter().copied()),
        relative_good_minus_bad: Moments::of(relative.iter().copied()),
        skewness,
        kurtosis,
        orphans: total.iter().filter(|&&t| t == 0).count(),
        hubs: total.iter().filter(|&&t| t as f32 > hub_threshold).count(),
    }
}

/// Standardized third and excess fourth moments.
fn shape(values: &[f64], moments: Moments) -> (f32, f32) {
    let sd = f64::from(moments.stdev);
    if values.is_empty() || sd <= 0.0 {
        return (0.0, 0.0);
    }
    let mean = f64::from(moments.mean);
    let n = values.len() as f64;
    let (m3, m4) = values.iter().fold((0.0, 0.0), |(a, b), &v| {
        let z = (v - mean) / sd;
        (a + z * z * z, b + z * z * z * z)
    });
    ((m3 / n) as f32, (m4 / n - 3.0) as f32)
}

/// Reverse sets and occurrence counts from the first `k` entries of each set.
#[must_use]
pub fn occurrences_at(sets: &[NeighborSet], k: usize, labels: &Labels) -> (Occurrences, Vec<Vec<usize>>) {
    let n = sets.len();
    let mut occ = Occurrences::zeros(n);
    let mut reverse = vec![Vec::new(); n];
    for (owner, set) in sets.iter().enumerate() {
        for &neighbor in set.indices().iter().take(k) {
            occ.add(owner, neighbor, labels);
            reverse[neighbor].push(owner);
        }
    }
    (occ, reverse)
}
