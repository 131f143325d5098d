//! Error types for `knnhub`.
//!
//! This module provides a unified error type for all engine operations.
//! Configuration problems are reported before any computation begins;
//! per-pair distance failures are not errors at this level (they are counted
//! in a [`ComputeReport`](crate::matrix::ComputeReport) and skipped).

use thiserror::Error;

/// Result type alias for `knnhub` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in `knnhub` operations.
///
/// Error codes follow the pattern `KNNHUB-XXX` for easy debugging.
#[derive(Error, Debug)]
pub enum Error {
    /// Neighborhood size is zero or too large for the dataset (KNNHUB-001).
    #[error("[KNNHUB-001] Invalid neighborhood size k={k}: {reason}")]
    InvalidK {
        /// Requested neighborhood size.
        k: usize,
        /// Why the value was rejected.
        reason: String,
    },

    /// Dataset has no instances (KNNHUB-002).
    #[error("[KNNHUB-002] Dataset is empty")]
    EmptyDataset,

    /// Label source and distance matrix disagree on the instance count (KNNHUB-003).
    #[error("[KNNHUB-003] Size mismatch: expected {expected} instances, got {actual}")]
    SizeMismatch {
        /// Expected number of instances.
        expected: usize,
        /// Actual number of instances.
        actual: usize,
    },

    /// Operation needs a distance matrix that was never attached (KNNHUB-004).
    #[error("[KNNHUB-004] Distance matrix required for {0}")]
    MissingDistanceMatrix(&'static str),

    /// Neighbor sets have not been computed yet (KNNHUB-005).
    #[error("[KNNHUB-005] Neighbor sets not computed; call calculate_neighbor_sets first")]
    NotComputed,

    /// Instance index outside `[0, n)` (KNNHUB-006).
    #[error("[KNNHUB-006] Instance index {index} out of range for {len} instances")]
    IndexOutOfRange {
        /// Offending index.
        index: usize,
        /// Number of instances.
        len: usize,
    },

    /// Invalid parameter value (KNNHUB-007).
    #[error("[KNNHUB-007] Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Configuration error (KNNHUB-008).
    #[error("[KNNHUB-008] Configuration error: {0}")]
    Config(String),

    /// IO error (KNNHUB-009).
    #[error("[KNNHUB-009] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed neighbor-set file (KNNHUB-010).
    #[error("[KNNHUB-010] Parse error at line {line}: {message}")]
    Parse {
        /// 1-based line number.
        line: usize,
        /// What was wrong.
        message: String,
    },

    /// Thread pool could not be created (KNNHUB-011).
    #[error("[KNNHUB-011] Worker pool error: {0}")]
    WorkerPool(String),
}

impl Error {
    /// Returns the error code (e.g., "KNNHUB-001").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidK { .. } => "KNNHUB-001",
            Self::EmptyDataset => "KNNHUB-002",
            Self::SizeMismatch { .. } => "KNNHUB-003",
            Self::MissingDistanceMatrix(_) => "KNNHUB-004",
            Self::NotComputed => "KNNHUB-005",
            Self::IndexOutOfRange { .. } => "KNNHUB-006",
            Self::InvalidParameter(_) => "KNNHUB-007",
            Self::Config(_) => "KNNHUB-008",
            Self::Io(_) => "KNNHUB-009",
            Self::Parse { .. } => "KNNHUB-010",
            Self::WorkerPool(_) => "KNNHUB-011",
        }
    }

    /// Returns true if this error is recoverable.
    ///
    /// Configuration errors are not: the same call will fail the same way.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::WorkerPool(_) | Self::NotComputed)
    }

    /// Shorthand for [`Error::InvalidK`].
    pub(crate) fn invalid_k(k: usize, reason: impl Into<String>) -> Self {
        Self::InvalidK {
            k,
            reason: reason.into(),
        }
    }

    /// Shorthand for [`Error::Parse`].
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}

/// Conversion from configuration errors.
impl From<crate::config::ConfigError> for Error {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
