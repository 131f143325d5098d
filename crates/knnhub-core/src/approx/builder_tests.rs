//! Tests for the approximate graph builder.

use super::*;
use crate::dataset::DenseDataset;
use crate::distance::DistanceMetric;
use rand::Rng;

/// Three gaussian-ish blobs in 4 dimensions, labelled by blob.
fn blobs(n: usize, seed: u64) -> DenseDataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let centers = [[0.0f32, 0.0, 0.0, 0.0], [8.0, 8.0, 0.0, 0.0], [0.0, 8.0, 8.0, 4.0]];
    let mut vectors = Vec::with_capacity(n);
    let mut labels = Vec::with_capacity(n);
    for i in 0..n {
        let c = i % centers.len();
        vectors.push(
            centers[c]
                .iter()
                .map(|x| x + rng.gen_range(-2.0f32..2.0))
                .collect(),
        );
        labels.push(c);
    }
    DenseDataset::new(vectors, Labels::new(labels, 3).unwrap()).unwrap()
}

fn exact(dataset: &DenseDataset, k: usize) -> NeighborSetEngine {
    let (mut engine, _) = NeighborSetEngine::from_dataset(dataset, &DistanceMetric::Euclidean).unwrap();
    engine.calculate_neighbor_sets(k).unwrap();
    engine
}

fn builder(division_threshold: usize) -> ApproximateGraphBuilder {
    ApproximateGraphBuilder::new(ApproximateConfig {
        division_threshold: Some(division_threshold),
        ..ApproximateConfig::default()
    })
    .unwrap()
}

#[test]
fn test_small_dataset_equals_exact() {
    // Arrange: n below the default threshold of max(5k, 100)
    let dataset = blobs(60, 1);
    let expected = exact(&dataset, 5);

    // Act
    let graph = ApproximateGraphBuilder::default()
        .build(&dataset, &DistanceMetric::Euclidean, 5)
        .unwrap();

    // Assert
    assert_eq!(graph.stats().splits, 0);
    assert_eq!(graph.kneighbors(), expected.kneighbors());
    for i in 0..graph.len() {
        assert_eq!(graph.distances(i), expected.neighbor_distances(i));
    }
    assert!((graph.recall_against(&expected).unwrap() - 1.0).abs() < 1e-12);
}

#[test]
fn test_partitioned_graph_is_well_formed() {
    let dataset = blobs(240, 2);
    let k = 6;

    let graph = builder(40).build(&dataset, &DistanceMetric::Euclidean, k).unwrap();

    assert!(graph.stats().splits > 0);
    assert!(graph.stats().leaves > 1);
    for i in 0..graph.len() {
        let neighbors = graph.neighbors(i);
        assert_eq!(neighbors.len(), k);
        assert!(!neighbors.contains(&i));
        let mut unique = neighbors.to_vec();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), k);
        assert!(graph.distances(i).windows(2).all(|w| w[0] <= w[1]));
    }
}

#[test]
fn test_partitioned_graph_has_high_recall() {
    let dataset = blobs(300, 3);
    let expected = exact(&dataset, 5);

    let graph = builder(50).build(&dataset, &DistanceMetric::Euclidean, 5).unwrap();
    let recall = graph.recall_against(&expected).unwrap();

    assert!(recall > 0.7, "recall = {recall}");
}

#[test]
fn test_partitioned_graph_skips_most_pairs() {
    let dataset = blobs(600, 4);
    let n = dataset.len();

    let graph = builder(50).build(&dataset, &DistanceMetric::Euclidean, 5).unwrap();

    assert!(graph.report().pairs < n * (n - 1) / 2);
    assert!(graph.stats().cache_hits > 0);
}

#[test]
fn test_build_is_deterministic_for_a_seed() {
    let dataset = blobs(200, 5);

    let first = builder(30).build(&dataset, &DistanceMetric::Euclidean, 4).unwrap();
    let second = builder(30).build(&dataset, &DistanceMetric::Euclidean, 4).unwrap();

    assert_eq!(first.kneighbors(), second.kneighbors());
    assert_eq!(first.stats(), second.stats());
}

#[test]
fn test_identical_points_fall_back_to_median() {
    let dataset = DenseDataset::unlabeled(vec![vec![1.0, 1.0]; 30]).unwrap();

    let graph = builder(5).build(&dataset, &DistanceMetric::Euclidean, 3).unwrap();

    assert!(graph.stats().median_fallbacks > 0);
    for i in 0..graph.len() {
        assert_eq!(graph.neighbors(i).len(), 3);
        assert!(graph.distances(i).iter().all(|d| *d == 0.0));
    }
}

#[test]
fn test_into_engine_derives_statistics() {
    let dataset = blobs(150, 6);
    let k = 4;

    let engine = builder(30).build_engine(&dataset, &DistanceMetric::Euclidean, k).unwrap();

    assert_eq!(engine.k(), k);
    assert_eq!(engine.occurrences().total.iter().sum::<usize>(), dataset.len() * k);
    assert!(engine.distance_matrix().is_none());
}

#[test]
fn test_invalid_arguments() {
    let dataset = blobs(10, 7);
    let b = ApproximateGraphBuilder::default();

    assert!(matches!(
        b.build(&dataset, &DistanceMetric::Euclidean, 0),
        Err(Error::InvalidK { k: 0, .. })
    ));
    assert!(matches!(
        b.build(&dataset, &DistanceMetric::Euclidean, 10),
        Err(Error::InvalidK { k: 10, .. })
    ));

    let empty = DenseDataset::unlabeled(Vec::new()).unwrap();
    assert!(matches!(
        b.build(&empty, &DistanceMetric::Euclidean, 1),
        Err(Error::EmptyDataset)
    ));
}

#[test]
fn test_config_validation() {
    let bad_overlap = ApproximateConfig {
        overlap_ratio: 1.0,
        ..ApproximateConfig::default()
    };
    assert!(ApproximateGraphBuilder::new(bad_overlap).is_err());

    let bad_dim = ApproximateConfig {
        subspace_dim: 0,
        ..ApproximateConfig::default()
    };
    assert!(matches!(bad_dim.validate(), Err(Error::InvalidParameter(_))));

    assert_eq!(ApproximateConfig::default().division_threshold_for(10), 100);
    assert_eq!(ApproximateConfig::default().division_threshold_for(30), 150);
}

#[test]
fn test_recall_against_rejects_other_sizes() {
    let graph = ApproximateGraphBuilder::default()
        .build(&blobs(20, 8), &DistanceMetric::Euclidean, 3)
        .unwrap();
    let other = exact(&blobs(21, 8), 3);

    assert!(matches!(
        graph.recall_against(&other),
        Err(Error::SizeMismatch { expected: 21, actual: 20 })
    ));
}
