//! Tests for hubness-based instance weights.

use super::*;
use std::sync::Arc;

const LINE: [f32; 6] = [0.0, 1.0, 3.0, 6.0, 10.0, 15.0];

/// Occurrences at k = 2: total [2, 2, 3, 2, 2, 1], bad [0, 0, 1, 0, 0, 0].
fn engine(k: usize) -> NeighborSetEngine {
    let labels = Labels::new(vec![0, 0, 0, 1, 1, 1], 2).unwrap();
    let matrix = DistanceMatrix::from_fn(LINE.len(), |i, j| (LINE[i] - LINE[j]).abs());
    let mut engine = NeighborSetEngine::new(labels, Arc::new(matrix)).unwrap();
    engine.calculate_neighbor_sets(k).unwrap();
    engine
}

#[test]
fn test_hubness_weights_penalize_hubs() {
    let engine = engine(2);

    let weights = engine.hubness_weights(HubnessDirection::Penalize).unwrap();

    // Instance 0 sits exactly at the mean.
    assert!((weights[0] - 1.0).abs() < 1e-6);
    assert!(weights[2] < weights[0]);
    assert!(weights[5] > weights[0]);
}

#[test]
fn test_reward_is_reciprocal_of_penalize() {
    let engine = engine(2);

    let penalize = engine.hubness_weights(HubnessDirection::Penalize).unwrap();
    let reward = engine.hubness_weights(HubnessDirection::Reward).unwrap();

    for (p, r) in penalize.iter().zip(&reward) {
        assert!((p * r - 1.0).abs() < 1e-5);
    }
}

#[test]
fn test_bad_hubness_weights() {
    let engine = engine(2);

    let uncapped = engine.bad_hubness_weights(false).unwrap();
    let capped = engine.bad_hubness_weights(true).unwrap();

    assert!(uncapped[2] < 1.0);
    assert!(uncapped[0] > 1.0);
    assert_eq!(capped[0], 1.0);
    assert!((capped[2] - uncapped[2]).abs() < 1e-6);
    assert!(capped.iter().all(|w| *w <= 1.0));
}

#[test]
fn test_good_minus_bad_weights_are_bounded() {
    let engine = engine(2);

    let weights = engine.good_minus_bad_weights(0.5, 1.5).unwrap();

    assert!(weights.iter().all(|w| (0.5..=1.5).contains(w)));
    // Instances 2 and 5 share the lowest good-minus-bad value.
    let min = weights.iter().copied().fold(f32::INFINITY, f32::min);
    assert_eq!(weights[2], min);
}

#[test]
fn test_relative_weights_default_to_one_for_orphans() {
    let engine = engine(1);
    assert_eq!(engine.orphans(), vec![5]);

    let weights = engine.relative_good_minus_bad_weights(0.0, 10.0).unwrap();

    assert_eq!(weights[5], 1.0);
    assert_eq!(weights.len(), 6);
}

#[test]
fn test_empty_bounds_rejected() {
    let engine = engine(2);
    assert!(matches!(
        engine.good_minus_bad_weights(2.0, 1.0),
        Err(Error::InvalidParameter(_))
    ));
    assert!(matches!(
        engine.relative_good_minus_bad_weights(f32::NAN, 1.0),
        Err(Error::InvalidParameter(_))
    ));
}

#[test]
fn test_simhub_weights_are_normalized() {
    let engine = engine(2);

    let weights = engine.simhub_weights(0.0).unwrap();

    // Instance 5 occurs once with a pure reverse set: the largest weight.
    assert!((weights[5] - 1.0).abs() < 1e-6);
    assert!(weights.iter().all(|w| w.abs() <= 1.0 + 1e-6));
    assert!(weights[2] < weights[0]);
}

#[test]
fn test_weights_require_computed_sets() {
    let labels = Labels::from_labels(vec![0, 1]);
    let matrix = Arc::new(DistanceMatrix::from_fn(2, |_, _| 1.0));
    let engine = NeighborSetEngine::new(labels, matrix).unwrap();

    assert!(matches!(engine.simhub_weights(0.0), Err(Error::NotComputed)));
    assert!(matches!(
        engine.hubness_weights(HubnessDirection::Reward),
        Err(Error::NotComputed)
    ));
}
