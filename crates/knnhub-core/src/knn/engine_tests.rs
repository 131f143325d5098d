//! Tests for the exact k-NN engine.

use super::*;
use crate::dataset::{DenseDataset, Labels};
use crate::distance::DistanceMetric;
use crate::pool::RowPartitionPool;
use std::sync::Arc;

const LINE: [f32; 6] = [0.0, 1.0, 3.0, 6.0, 10.0, 15.0];

fn line_matrix(points: &[f32]) -> Arc<DistanceMatrix> {
    Arc::new(DistanceMatrix::from_fn(points.len(), |i, j| {
        (points[i] - points[j]).abs()
    }))
}

/// Six points on a line, first three in class 0, last three in class 1.
fn line_engine(k: usize) -> NeighborSetEngine {
    let labels = Labels::new(vec![0, 0, 0, 1, 1, 1], 2).unwrap();
    let mut engine = NeighborSetEngine::new(labels, line_matrix(&LINE)).unwrap();
    engine.calculate_neighbor_sets(k).unwrap();
    engine
}

/// Two tight triples far apart, one class each.
const TRIPLES: [f32; 6] = [0.0, 1.0, 2.0, 10.0, 11.0, 12.0];

#[test]
fn test_two_triples_neighbor_within_themselves() {
    // Arrange
    let labels = Labels::new(vec![0, 0, 0, 1, 1, 1], 2).unwrap();
    let mut engine = NeighborSetEngine::new(labels, line_matrix(&TRIPLES)).unwrap();

    // Act
    engine.calculate_neighbor_sets(2).unwrap();

    // Assert: point 1 is equidistant from 0 and 2, the lower index comes first
    assert_eq!(
        engine.kneighbors(),
        vec![vec![1, 2], vec![0, 2], vec![1, 0], vec![4, 5], vec![3, 5], vec![4, 3]]
    );
    assert_eq!(
        engine.kdistances(),
        vec![
            vec![1.0, 2.0],
            vec![1.0, 1.0],
            vec![1.0, 2.0],
            vec![1.0, 2.0],
            vec![1.0, 1.0],
            vec![1.0, 2.0],
        ]
    );
    assert_eq!(engine.occurrences().total, vec![2; 6]);
    assert_eq!(engine.occurrences().bad, vec![0; 6]);
    assert_eq!(engine.reverse_neighbors(0), &[1, 2]);
    assert_eq!(engine.reverse_neighbors(5), &[3, 4]);
}

#[test]
fn test_two_triples_same_for_every_thread_count() {
    let labels = Labels::new(vec![0, 0, 0, 1, 1, 1], 2).unwrap();
    let mut single = NeighborSetEngine::new(labels.clone(), line_matrix(&TRIPLES)).unwrap();
    single.calculate_neighbor_sets(2).unwrap();

    for threads in [1, 2, 4, 8] {
        let pool = RowPartitionPool::new(threads).unwrap();
        let mut parallel = NeighborSetEngine::new(labels.clone(), line_matrix(&TRIPLES)).unwrap();
        parallel.calculate_neighbor_sets_parallel(2, &pool).unwrap();
        assert_eq!(parallel.kneighbors(), single.kneighbors(), "threads = {threads}");
        assert_eq!(parallel.kdistances(), single.kdistances(), "threads = {threads}");
    }
}

#[test]
fn test_new_rejects_empty_labels() {
    let result = NeighborSetEngine::new(Labels::from_labels(vec![]), line_matrix(&[]));
    assert!(matches!(result, Err(Error::EmptyDataset)));
}

#[test]
fn test_new_rejects_size_mismatch() {
    let labels = Labels::from_labels(vec![0, 1, 0]);
    let result = NeighborSetEngine::new(labels, line_matrix(&LINE));
    assert!(matches!(result, Err(Error::SizeMismatch { expected: 3, actual: 6 })));
}

#[test]
fn test_invalid_k_fails_before_computing() {
    let labels = Labels::from_labels(vec![0; 6]);
    let mut engine = NeighborSetEngine::new(labels, line_matrix(&LINE)).unwrap();

    assert!(matches!(engine.calculate_neighbor_sets(0), Err(Error::InvalidK { k: 0, .. })));
    assert!(matches!(engine.calculate_neighbor_sets(6), Err(Error::InvalidK { k: 6, .. })));
    assert!(!engine.is_computed());
}

#[test]
fn test_line_neighbor_sets() {
    // Act
    let engine = line_engine(2);

    // Assert
    assert_eq!(engine.k(), 2);
    assert_eq!(engine.neighbors(0), &[1, 2]);
    assert_eq!(engine.neighbors(1), &[0, 2]);
    // 0 and 3 are both at distance 3 from instance 2: the lower index wins.
    assert_eq!(engine.neighbors(2), &[1, 0]);
    assert_eq!(engine.neighbors(3), &[2, 4]);
    assert_eq!(engine.neighbors(4), &[3, 5]);
    assert_eq!(engine.neighbors(5), &[4, 3]);
    assert_eq!(engine.neighbor_distances(3), &[3.0, 4.0]);
}

#[test]
fn test_line_occurrences() {
    let engine = line_engine(2);
    let occ = engine.occurrences();

    assert_eq!(occ.total, vec![2, 2, 3, 2, 2, 1]);
    assert_eq!(occ.bad, vec![0, 0, 1, 0, 0, 0]);
    assert_eq!(occ.good, vec![2, 2, 2, 2, 2, 1]);
    assert!((engine.bad_hubness_ratio() - 1.0 / 12.0).abs() < 1e-6);
    assert!((engine.stats().total.mean - 2.0).abs() < 1e-6);
}

#[test]
fn test_reverse_sets_are_consistent() {
    let engine = line_engine(3);

    for i in 0..engine.len() {
        for &j in engine.reverse_neighbors(i) {
            assert!(engine.neighbors(j).contains(&i));
        }
        for &j in engine.neighbors(i) {
            assert!(engine.reverse_neighbors(j).contains(&i));
        }
        let occ = engine.occurrences();
        assert_eq!(occ.total[i], engine.reverse_neighbors(i).len());
        assert_eq!(occ.good[i] + occ.bad[i], occ.total[i]);
        assert!(engine.reverse_neighbors(i).windows(2).all(|w| w[0] < w[1]));
    }
}

#[test]
fn test_parallel_matches_single_threaded() {
    let single = line_engine(3);

    for threads in [1, 2, 4, 8] {
        let pool = RowPartitionPool::new(threads).unwrap();
        let labels = Labels::new(vec![0, 0, 0, 1, 1, 1], 2).unwrap();
        let mut engine = NeighborSetEngine::new(labels, line_matrix(&LINE)).unwrap();

        let report = engine.calculate_neighbor_sets_parallel(3, &pool).unwrap();

        assert!(report.is_complete());
        assert_eq!(engine.kneighbors(), single.kneighbors(), "threads = {threads}");
        assert_eq!(engine.kdistances(), single.kdistances());
        assert_eq!(engine.occurrences(), single.occurrences());
    }
}

#[test]
fn test_from_dataset_computes_matrix() {
    let dataset = DenseDataset::new(
        LINE.iter().map(|&x| vec![x, 0.0]).collect(),
        Labels::new(vec![0, 0, 0, 1, 1, 1], 2).unwrap(),
    )
    .unwrap();

    let (mut engine, report) = NeighborSetEngine::from_dataset(&dataset, &DistanceMetric::Euclidean).unwrap();
    engine.calculate_neighbor_sets(2).unwrap();

    assert_eq!(report.pairs, 15);
    assert!(report.is_clean());
    assert_eq!(engine.kneighbors(), line_engine(2).kneighbors());
}

#[test]
fn test_sub_engine_is_prefix() {
    let engine = line_engine(3);

    let sub = engine.sub_engine(1).unwrap();

    assert_eq!(sub.k(), 1);
    for i in 0..engine.len() {
        assert_eq!(sub.neighbors(i), &engine.neighbors(i)[..1]);
    }
    assert_eq!(sub.occurrences().total, vec![1, 2, 1, 1, 1, 0]);
    assert_eq!(sub.orphans(), vec![5]);
}

#[test]
fn test_sub_engine_matches_fresh_computation() {
    let wide = line_engine(4);
    let fresh = line_engine(2);

    let sub = wide.sub_engine(2).unwrap();

    assert_eq!(sub.kneighbors(), fresh.kneighbors());
    assert_eq!(sub.occurrences(), fresh.occurrences());
    assert_eq!(sub.stats(), fresh.stats());
    for i in 0..sub.len() {
        assert_eq!(sub.reverse_neighbors(i), fresh.reverse_neighbors(i));
    }
}

#[test]
fn test_sub_engine_rejects_wider_k() {
    let engine = line_engine(2);
    assert!(matches!(engine.sub_engine(3), Err(Error::InvalidK { k: 3, .. })));
    assert!(matches!(engine.sub_engine(0), Err(Error::InvalidK { k: 0, .. })));
}

#[test]
fn test_recalculate_stats_for_smaller_k() {
    let mut engine = line_engine(3);
    let expected = line_engine(1);

    engine.recalculate_stats_for_k(1).unwrap();

    assert_eq!(engine.k(), 1);
    assert_eq!(engine.stored_k(), 3);
    assert_eq!(engine.occurrences(), expected.occurrences());
    assert_eq!(engine.stats(), expected.stats());

    // The stored width is still available.
    engine.recalculate_stats_for_k(3).unwrap();
    assert_eq!(engine.occurrences(), line_engine(3).occurrences());
}

#[test]
fn test_occurrence_frequencies_for_all_k() {
    let engine = line_engine(3);

    let all = engine.occurrence_frequencies_for_all_k().unwrap();

    assert_eq!(all.len(), 3);
    for (k_minus_one, row) in all.iter().enumerate() {
        assert_eq!(row, &line_engine(k_minus_one + 1).occurrences().total);
    }
}

#[test]
fn test_project_onto_matches_fresh_engine() {
    let engine = line_engine(2);
    let prototypes = [0, 2, 3, 5];
    let matrix = Arc::new(engine.distance_matrix().unwrap().select(&prototypes));
    let labels = engine.labels().select(&prototypes);

    let projected = engine
        .project_onto(2, &prototypes, Arc::clone(&matrix), labels.clone())
        .unwrap();

    let mut fresh = NeighborSetEngine::new(labels, matrix).unwrap();
    fresh.calculate_neighbor_sets(2).unwrap();
    assert_eq!(projected.kneighbors(), fresh.kneighbors());
    assert_eq!(projected.occurrences(), fresh.occurrences());
}

#[test]
fn test_project_onto_rejects_bad_prototypes() {
    let engine = line_engine(2);
    let matrix = Arc::new(engine.distance_matrix().unwrap().select(&[2, 0, 3]));
    let labels = Labels::from_labels(vec![0, 0, 1]);

    let unsorted = engine.project_onto(1, &[2, 0, 3], Arc::clone(&matrix), labels.clone());
    assert!(matches!(unsorted, Err(Error::InvalidParameter(_))));

    let too_wide = engine.project_onto(3, &[0, 2, 3], matrix, labels);
    assert!(matches!(too_wide, Err(Error::InvalidK { k: 3, .. })));
}

#[test]
fn test_not_computed_errors() {
    let labels = Labels::from_labels(vec![0; 6]);
    let engine = NeighborSetEngine::new(labels, line_matrix(&LINE)).unwrap();

    assert!(matches!(engine.sub_engine(1), Err(Error::NotComputed)));
    assert!(matches!(engine.neighbor_entropies(), Err(Error::NotComputed)));
    assert!(matches!(engine.occurrence_frequencies_for_all_k(), Err(Error::NotComputed)));
}

#[test]
fn test_from_neighbor_sets_without_matrix() {
    let labels = Labels::from_labels(vec![0, 1, 0]);
    let sets = vec![
        NeighborSet::from_sorted(vec![2], vec![1.0], 1).unwrap(),
        NeighborSet::from_sorted(vec![0], vec![2.0], 1).unwrap(),
        NeighborSet::from_sorted(vec![0], vec![1.0], 1).unwrap(),
    ];

    let mut engine = NeighborSetEngine::from_neighbor_sets(labels, sets, 1).unwrap();

    assert_eq!(engine.occurrences().total, vec![2, 0, 1]);
    assert_eq!(engine.occurrences().bad, vec![1, 0, 0]);
    assert!(matches!(
        engine.calculate_neighbor_sets(1),
        Err(Error::MissingDistanceMatrix(_))
    ));
}

#[test]
fn test_from_neighbor_sets_rejects_k_at_dataset_size() {
    let labels = Labels::from_labels(vec![0, 1]);
    let sets = vec![
        NeighborSet::from_sorted(vec![1], vec![1.0], 2).unwrap(),
        NeighborSet::from_sorted(vec![0], vec![1.0], 2).unwrap(),
    ];

    let result = NeighborSetEngine::from_neighbor_sets(labels, sets, 2);

    assert!(matches!(result, Err(Error::InvalidK { k: 2, .. })));
}

#[test]
fn test_from_neighbor_sets_rejects_self_neighbor() {
    let labels = Labels::from_labels(vec![0, 0]);
    let sets = vec![
        NeighborSet::from_sorted(vec![0], vec![0.0], 1).unwrap(),
        NeighborSet::from_sorted(vec![0], vec![1.0], 1).unwrap(),
    ];

    let result = NeighborSetEngine::from_neighbor_sets(labels, sets, 1);

    assert!(matches!(result, Err(Error::InvalidParameter(_))));
}

#[test]
fn test_hub_queries() {
    let engine = line_engine(2);

    assert_eq!(engine.hubs(1.0), vec![2]);
    assert_eq!(engine.anti_hubs(2), vec![5, 0]);
    assert!(engine.orphans().is_empty());
    assert_eq!(engine.neighbor_label_distribution(3), vec![0.5, 0.5]);
    assert_eq!(engine.neighbor_label_distribution(4), vec![0.0, 1.0]);
}

#[test]
fn test_entropy_of_counts() {
    assert!((entropy_of_counts(&[1.0, 1.0], 2) - 1.0).abs() < 1e-6);
    assert!((entropy_of_counts(&[4.0, 0.0], 4)).abs() < 1e-6);
    assert_eq!(entropy_of_counts(&[1.0, 0.0], 1), 0.0);
    assert_eq!(entropy_of_counts(&[0.0, 0.0], 0), 0.0);
}

#[test]
fn test_neighbor_and_reverse_entropies() {
    let engine = line_engine(2);

    let forward = engine.neighbor_entropies().unwrap();
    let reverse = engine.reverse_neighbor_entropies(None).unwrap();

    // Instance 3 sees one neighbor of each class.
    assert!((forward[3] - 1.0).abs() < 1e-6);
    assert_eq!(forward[0], 0.0);
    // Instance 5 has a single reverse neighbor.
    assert_eq!(reverse[5], 0.0);
    assert!(reverse[2] > 0.0);
    assert!((engine.max_entropy() - 1.0).abs() < 1e-6);
}

#[test]
fn test_reverse_entropies_reject_wrong_weight_count() {
    let engine = line_engine(2);
    let result = engine.reverse_neighbor_entropies(Some(&[1.0]));
    assert!(matches!(result, Err(Error::InvalidParameter(_))));
}

#[test]
fn test_local_intrinsic_dimensionality() {
    let engine = line_engine(3);

    let lid = engine.local_intrinsic_dimensionality(LidConfig::default()).unwrap();

    assert_eq!(lid.len(), 6);
    assert!(lid.iter().all(|v| *v > 0.0));
}

mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        /// Property: every set has min(k, n-1) distinct, ascending entries and
        /// the parallel result equals the single-threaded one.
        #[test]
        fn prop_parallel_sets_are_valid_and_identical(
            points in proptest::collection::vec(-100.0f32..100.0, 2usize..40),
            k_seed in 1usize..10,
            threads in 1usize..=8,
        ) {
            let n = points.len();
            let k = 1 + k_seed % (n - 1);
            let labels = Labels::from_labels((0..n).map(|i| i % 3).collect());
            let matrix = line_matrix(&points);

            let mut single = NeighborSetEngine::new(labels.clone(), Arc::clone(&matrix)).unwrap();
            single.calculate_neighbor_sets(k).unwrap();
            let pool = RowPartitionPool::new(threads).unwrap();
            let mut parallel = NeighborSetEngine::new(labels, matrix).unwrap();
            parallel.calculate_neighbor_sets_parallel(k, &pool).unwrap();

            prop_assert_eq!(single.kneighbors(), parallel.kneighbors());
            for i in 0..n {
                let neighbors = single.neighbors(i);
                prop_assert_eq!(neighbors.len(), k.min(n - 1));
                prop_assert!(!neighbors.contains(&i));
                let mut unique = neighbors.to_vec();
                unique.sort_unstable();
                unique.dedup();
                prop_assert_eq!(unique.len(), neighbors.len());
                prop_assert!(single.neighbor_distances(i).windows(2).all(|w| w[0] <= w[1]));
            }
        }
    }
}

#[test]
#[should_panic(expected = "index out of bounds")]
fn test_neighbors_panics_past_the_end() {
    let engine = line_engine(2);
    let _ = engine.neighbors(LINE.len());
}

#[test]
#[should_panic(expected = "index out of bounds")]
fn test_reverse_neighbors_panics_past_the_end() {
    let engine = line_engine(2);
    let _ = engine.reverse_neighbors(LINE.len());
}
