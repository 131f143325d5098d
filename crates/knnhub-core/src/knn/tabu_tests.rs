//! Tests for tabu exclusion and completion.

use super::*;
use std::sync::Arc;

const POINTS: [f32; 5] = [0.0, 1.0, 2.0, 4.0, 7.0];

fn matrix(points: &[f32]) -> Arc<DistanceMatrix> {
    Arc::new(DistanceMatrix::from_fn(points.len(), |i, j| {
        (points[i] - points[j]).abs()
    }))
}

fn engine(k: usize) -> NeighborSetEngine {
    let labels = Labels::new(vec![0, 1, 0, 1, 0], 2).unwrap();
    let mut engine = NeighborSetEngine::new(labels, matrix(&POINTS)).unwrap();
    engine.calculate_neighbor_sets(k).unwrap();
    engine
}

#[test]
fn test_tabu_equals_fresh_computation_on_remaining_points() {
    // Arrange
    let mut engine = engine(2);
    let mut tabu = TabuSet::default();
    let remaining = [0usize, 1, 3, 4];

    // Act
    let repaired = engine.tabu_neighbor(2, &mut tabu, true).unwrap();

    // Assert
    assert_eq!(repaired, 4);
    assert!(tabu.contains(&2));
    assert!(engine.neighbors(2).is_empty());

    let labels = engine.labels().select(&remaining);
    let mut fresh = NeighborSetEngine::new(labels, matrix(&[0.0, 1.0, 4.0, 7.0])).unwrap();
    fresh.calculate_neighbor_sets(2).unwrap();
    for (p, &original) in remaining.iter().enumerate() {
        let mapped: Vec<usize> = fresh.neighbors(p).iter().map(|&q| remaining[q]).collect();
        assert_eq!(engine.neighbors(original), mapped.as_slice(), "instance {original}");
        assert_eq!(engine.neighbor_distances(original), fresh.neighbor_distances(p));
        assert_eq!(
            engine.occurrences().total[original],
            fresh.occurrences().total[p]
        );
    }
    assert_eq!(engine.occurrences().total[2], 0);
}

#[test]
fn test_tabu_keeps_statistics_consistent() {
    let mut engine = engine(2);
    let mut tabu = TabuSet::default();

    engine.tabu_neighbor(2, &mut tabu, false).unwrap();
    engine.tabu_neighbor(0, &mut tabu, false).unwrap();

    let (expected, reverse) = occurrences_at(engine.neighbor_sets(), 2, engine.labels());
    assert_eq!(engine.occurrences(), &expected);
    for (i, owners) in reverse.iter().enumerate() {
        assert_eq!(engine.reverse_neighbors(i), owners.as_slice());
    }
    for set in engine.neighbor_sets() {
        assert!(!set.contains(0) && !set.contains(2));
    }
}

#[test]
fn test_aggregates_refresh_only_on_request() {
    let mut engine = engine(2);
    let before = engine.stats().clone();
    let mut tabu = TabuSet::default();

    engine.tabu_neighbor(4, &mut tabu, false).unwrap();
    assert_eq!(engine.stats(), &before);

    engine.refresh_stats();
    let occ = engine.occurrences();
    assert_eq!(engine.stats(), &hubness_stats(&occ.good, &occ.bad, &occ.total));
}

#[test]
fn test_tabu_requires_distance_matrix() {
    let engine = engine(2);
    let mut detached =
        NeighborSetEngine::from_neighbor_sets(engine.labels().clone(), engine.neighbor_sets().to_vec(), 2)
            .unwrap();
    let mut tabu = TabuSet::default();

    let result = detached.tabu_neighbor(1, &mut tabu, true);

    assert!(matches!(result, Err(Error::MissingDistanceMatrix(_))));
}

#[test]
fn test_tabu_rejects_out_of_range_index() {
    let mut engine = engine(2);
    let mut tabu = TabuSet::default();
    let result = engine.tabu_neighbor(5, &mut tabu, true);
    assert!(matches!(result, Err(Error::IndexOutOfRange { index: 5, len: 5 })));
}

#[test]
fn test_complete_grows_width_and_honors_tabu() {
    // Arrange
    let mut engine = engine(2);
    let mut tabu = TabuSet::default();
    engine.tabu_neighbor(2, &mut tabu, true).unwrap();

    // Act
    let completed = engine.complete_neighbor_sets(3, Some(&tabu)).unwrap();

    // Assert
    assert_eq!(completed, 4);
    assert_eq!(engine.k(), 3);
    assert_eq!(engine.stored_k(), 3);
    assert_eq!(engine.neighbors(0), &[1, 3, 4]);
    assert_eq!(engine.neighbors(4), &[3, 1, 0]);
    assert!(engine.neighbors(2).is_empty());
    assert_eq!(engine.occurrences().total[2], 0);
}

#[test]
fn test_complete_without_tabu_restores_full_sets() {
    let mut engine = engine(2);
    let mut tabu = TabuSet::default();
    engine.tabu_neighbor(2, &mut tabu, true).unwrap();

    let completed = engine.complete_neighbor_sets(2, None).unwrap();

    // Only the cleared set was short.
    assert_eq!(completed, 1);
    assert_eq!(engine.neighbors(2), &[1, 0]);
    assert_eq!(engine.occurrences().total.iter().sum::<usize>(), 10);
}
