//! Distance oracles.
//!
//! The engines never compute distances themselves; they ask a
//! [`DistanceOracle`]. An oracle may fail for a given pair (mismatched
//! dimensions, non-finite inputs, a remote backend timing out). Batch
//! operations treat a failed pair as "not computed": it is logged, counted,
//! and the pair is never offered as a neighbor.
//!
//! [`DistanceMetric`] provides the built-in oracles, backed by the explicit
//! SIMD kernels in [`crate::simd`].

use crate::simd;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of a single distance evaluation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DistanceError {
    /// The two vectors have different dimensions.
    #[error("dimension mismatch: {left} vs {right}")]
    DimensionMismatch {
        /// Dimension of the first vector.
        left: usize,
        /// Dimension of the second vector.
        right: usize,
    },

    /// The computed distance is NaN, infinite or negative.
    #[error("invalid distance value {0}")]
    InvalidValue(f32),

    /// Oracle-specific failure.
    #[error("{0}")]
    Other(String),
}

/// Pairwise distance between two instances.
///
/// Implementations must be symmetric and return non-negative values. They
/// must be `Sync`: the parallel paths share one oracle between workers.
pub trait DistanceOracle: Sync {
    /// Computes the distance between `a` and `b`.
    ///
    /// # Errors
    ///
    /// Returns a [`DistanceError`] if the distance cannot be computed.
    fn distance(&self, a: &[f32], b: &[f32]) -> Result<f32, DistanceError>;
}

impl<F> DistanceOracle for F
where
    F: Fn(&[f32], &[f32]) -> Result<f32, DistanceError> + Sync,
{
    fn distance(&self, a: &[f32], b: &[f32]) -> Result<f32, DistanceError> {
        self(a, b)
    }
}

/// Built-in distance metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Euclidean distance (L2 norm).
    #[default]
    Euclidean,

    /// Squared Euclidean distance. Same ranking as `Euclidean`, no sqrt.
    SquaredEuclidean,

    /// Manhattan distance (L1 norm).
    Manhattan,

    /// Cosine distance, `1 - cosine_similarity`, in `[0, 2]`.
    Cosine,
}

impl DistanceMetric {
    /// Calculates the distance between two vectors of equal dimension.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if vectors have different dimensions. Use the
    /// [`DistanceOracle`] impl for a checked version.
    #[must_use]
    #[inline]
    pub fn calculate(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Euclidean => simd::squared_l2(a, b).sqrt(),
            Self::SquaredEuclidean => simd::squared_l2(a, b),
            Self::Manhattan => simd::l1(a, b),
            // Rounding can push the similarity slightly above 1.
            Self::Cosine => (1.0 - simd::cosine_similarity(a, b)).max(0.0),
        }
    }
}

impl DistanceOracle for DistanceMetric {
    fn distance(&self, a: &[f32], b: &[f32]) -> Result<f32, DistanceError> {
        if a.len() != b.len() {
            return Err(DistanceError::DimensionMismatch {
                left: a.len(),
                right: b.len(),
            });
        }
        let d = self.calculate(a, b);
        if d.is_finite() && d >= 0.0 {
            Ok(d)
        } else {
            Err(DistanceError::InvalidValue(d))
        }
    }
}
