//! Recall of approximate neighbor lists against exact ones.
//!
//! ```rust
//! use knnhub_core::metrics::recall_at_k;
//!
//! let exact = vec![1usize, 2, 3, 4, 5];
//! let approx = vec![1usize, 3, 6, 2, 7];
//!
//! assert!((recall_at_k(&exact, &approx) - 0.6).abs() < 1e-12);
//! ```

use rustc_hash::FxHashSet;
use std::hash::Hash;

/// `|ground_truth ∩ results| / |ground_truth|`; 0 for an empty ground truth.
#[must_use]
pub fn recall_at_k<T: Eq + Hash + Copy>(ground_truth: &[T], results: &[T]) -> f64 {
    if ground_truth.is_empty() {
        return 0.0;
    }
    let truth: FxHashSet<T> = ground_truth.iter().copied().collect();
    let found = results.iter().filter(|id| truth.contains(id)).count();

    #[allow(clippy::cast_precision_loss)]
    let recall = found as f64 / ground_truth.len() as f64;
    recall
}

/// Mean [`recall_at_k`] over `(ground_truth, results)` pairs.
///
/// Pairs with an empty ground truth are skipped; returns 1 if every pair
/// is skipped (nothing to find, nothing missed).
#[must_use]
pub fn mean_recall<'a, T, I>(pairs: I) -> f64
where
    T: Eq + Hash + Copy + 'a,
    I: IntoIterator<Item = (&'a [T], &'a [T])>,
{
    let (sum, count) = pairs
        .into_iter()
        .filter(|(truth, _)| !truth.is_empty())
        .fold((0.0, 0usize), |(s, c), (truth, results)| {
            (s + recall_at_k(truth, results), c + 1)
        });
    if count == 0 {
        return 1.0;
    }

    #[allow(clippy::cast_precision_loss)]
    let mean = sum / count as f64;
    mean
}
