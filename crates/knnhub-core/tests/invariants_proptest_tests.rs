//! Property tests over random datasets.

use knnhub_core::{
    ApproximateConfig, ApproximateGraphBuilder, DenseDataset, DistanceMetric, Labels, NeighborSetEngine,
    RowPartitionPool,
};
use proptest::prelude::*;

fn dataset(points: &[(f32, f32)], categories: usize) -> DenseDataset {
    let labels = Labels::new((0..points.len()).map(|i| i % categories).collect(), categories).expect("labels");
    DenseDataset::new(points.iter().map(|&(x, y)| vec![x, y]).collect(), labels).expect("dataset")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: reverse sets mirror the forward sets and the occurrence
    /// counts agree with them.
    #[test]
    fn prop_reverse_sets_and_occurrences_agree(
        points in proptest::collection::vec((-20.0f32..20.0, -20.0f32..20.0), 2usize..40),
        k_seed in 1usize..8,
        categories in 1usize..4,
    ) {
        let n = points.len();
        let k = 1 + k_seed % (n - 1);
        let (mut engine, _) = NeighborSetEngine::from_dataset(&dataset(&points, categories), &DistanceMetric::Euclidean)
            .expect("engine");
        engine.calculate_neighbor_sets(k).expect("knn");

        let occ = engine.occurrences();
        prop_assert_eq!(occ.total.iter().sum::<usize>(), n * k);
        for i in 0..n {
            let reverse = engine.reverse_neighbors(i);
            prop_assert_eq!(occ.total[i], reverse.len());
            prop_assert_eq!(occ.good[i] + occ.bad[i], occ.total[i]);
            for &owner in reverse {
                prop_assert!(engine.neighbors(owner).contains(&i));
            }
            for &j in engine.neighbors(i) {
                prop_assert!(engine.reverse_neighbors(j).contains(&i));
            }
        }
    }

    /// Property: thread count never changes the result.
    #[test]
    fn prop_thread_count_is_invisible(
        points in proptest::collection::vec((-20.0f32..20.0, -20.0f32..20.0), 2usize..40),
        k_seed in 1usize..8,
        threads in 1usize..=8,
    ) {
        let n = points.len();
        let k = 1 + k_seed % (n - 1);
        let data = dataset(&points, 2);
        let (mut single, _) = NeighborSetEngine::from_dataset(&data, &DistanceMetric::Euclidean).expect("engine");
        single.calculate_neighbor_sets(k).expect("knn");

        let pool = RowPartitionPool::new(threads).expect("pool");
        let (mut parallel, _) =
            NeighborSetEngine::from_dataset_parallel(&data, &DistanceMetric::Euclidean, &pool).expect("engine");
        parallel.calculate_neighbor_sets_parallel(k, &pool).expect("knn");

        prop_assert_eq!(single.kneighbors(), parallel.kneighbors());
        prop_assert_eq!(single.kdistances(), parallel.kdistances());
        prop_assert_eq!(single.occurrences(), parallel.occurrences());
    }

    /// Property: the approximate graph always has full, valid, sorted sets,
    /// whatever the partitioning did.
    #[test]
    fn prop_approximate_sets_are_well_formed(
        points in proptest::collection::vec((-20.0f32..20.0, -20.0f32..20.0), 12usize..80),
        k_seed in 1usize..5,
        threshold in 6usize..20,
        seed in 0u64..1000,
    ) {
        let n = points.len();
        let k = 1 + k_seed % 4;
        let builder = ApproximateGraphBuilder::new(ApproximateConfig {
            division_threshold: Some(threshold),
            seed,
            ..ApproximateConfig::default()
        })
        .expect("builder");

        let graph = builder.build(&dataset(&points, 2), &DistanceMetric::Euclidean, k).expect("graph");

        prop_assert_eq!(graph.len(), n);
        for i in 0..n {
            let neighbors = graph.neighbors(i);
            prop_assert_eq!(neighbors.len(), k);
            prop_assert!(!neighbors.contains(&i));
            prop_assert!(neighbors.iter().all(|&j| j < n));
            let mut unique = neighbors.to_vec();
            unique.sort_unstable();
            unique.dedup();
            prop_assert_eq!(unique.len(), k);
            prop_assert!(graph.distances(i).windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
