//! Fuzz target for the neighbor-set text format.
//!
//! The header carries user-controlled sizes. The parser must reject any
//! malformed input with an error, never panic, and never allocate from the
//! declared size alone. Whatever parses must also load into an engine whose
//! statistics can be queried.

#![no_main]

use knnhub_core::knn::read_neighbor_file;
use knnhub_core::{Labels, NeighborSetEngine};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(file) = read_neighbor_file(data) else {
        return;
    };

    // Self neighbors are rejected later, when the sets meet their owners.
    let n = file.sets.len();
    assert!(file.k < n);
    for set in &file.sets {
        assert!(set.len() <= file.k);
        assert!(set.indices().iter().all(|&j| j < n));
        assert!(set.distances().windows(2).all(|w| w[0] <= w[1]));
    }

    let labels = Labels::from_labels((0..n).map(|i| i % 2).collect());
    let Ok(engine) = NeighborSetEngine::read_from(data, labels) else {
        return;
    };
    assert_eq!(engine.k(), file.k);
    if let Ok(all) = engine.occurrence_frequencies_for_all_k() {
        assert_eq!(all.len(), file.k);
    }
});
