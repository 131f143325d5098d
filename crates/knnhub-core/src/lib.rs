//! # `knnhub` Core
//!
//! k-nearest-neighbor graphs for labelled datasets, with the hubness
//! statistics and secondary similarities built on top of them.
//!
//! ## Features
//!
//! - **Exact k-NN**: brute force over an explicit distance matrix, single
//!   threaded or row-partitioned across a worker pool, with identical results
//! - **Incremental updates**: exclude instances (tabu) and repair only the
//!   affected sets, or fill partial sets without a full recomputation
//! - **Hubness statistics**: occurrence counts, good/bad hubness, skewness,
//!   label entropies and several instance weighting schemes
//! - **Approximate k-NN**: recursive Lanczos bisection with overlapping
//!   partitions and a lazily filled distance cache
//! - **Shared-neighbor similarity**: (weighted) neighbor-set overlaps as a
//!   secondary similarity measure
//!
//! ## Quick Start
//!
//! ```rust
//! use knnhub_core::{DenseDataset, DistanceMetric, Labels, NeighborSetEngine, SharedNeighborEngine};
//!
//! let points = vec![vec![0.0], vec![1.0], vec![3.0], vec![6.0], vec![10.0], vec![15.0]];
//! let labels = Labels::new(vec![0, 0, 0, 1, 1, 1], 2)?;
//! let dataset = DenseDataset::new(points, labels)?;
//!
//! let (mut engine, report) = NeighborSetEngine::from_dataset(&dataset, &DistanceMetric::Euclidean)?;
//! assert!(report.is_clean());
//! engine.calculate_neighbor_sets(2)?;
//! assert_eq!(engine.neighbors(3), &[2, 4]);
//!
//! let snn = SharedNeighborEngine::new(&engine, 2)?;
//! assert_eq!(snn.shared_count(0, 1)?, 1.0);
//! # Ok::<(), knnhub_core::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
// =============================================================================
// NUMERIC CAST LINTS
// =============================================================================
// Indices and counts are turned into f32/f64 for statistics all over the
// crate. Prefer a local #[allow(...)] for anything that is not a count.
// =============================================================================
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
// =============================================================================
// STYLISTIC LINTS
// =============================================================================
#![allow(clippy::option_if_let_else)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::suboptimal_flops)]
#![allow(clippy::derive_partial_eq_without_eq)]
#![allow(clippy::redundant_pub_crate)]
#![allow(clippy::imprecise_flops)]
#![allow(clippy::similar_names)]
#![allow(clippy::many_single_char_names)]

pub mod approx;
pub mod config;
pub mod dataset;
pub mod distance;
pub mod error;
pub mod knn;
pub mod logging;
pub mod matrix;
pub mod metrics;
pub mod pool;
pub mod simd;
pub mod snn;

pub use approx::{ApproximateConfig, ApproximateGraphBuilder, ApproximateKnnGraph, BuildStats};
pub use config::{ConfigError, KnnHubConfig};
pub use dataset::{Cluster, Dataset, DenseDataset, Labels};
pub use distance::{DistanceError, DistanceMetric, DistanceOracle};
pub use error::{Error, Result};
pub use knn::{HubnessDirection, HubnessStats, NeighborSet, NeighborSetEngine, TabuSet, WeightParams};
pub use matrix::{ComputeReport, DistanceMatrix};
pub use pool::{PoolReport, RowPartitionPool};
pub use snn::{InstanceWeighting, SharedNeighborEngine, SharedNeighborMatrix};
