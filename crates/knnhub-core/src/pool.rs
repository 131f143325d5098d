//! Row-partitioned worker pool.
//!
//! All parallel paths in this crate have the same shape: `n` rows, each
//! owned by exactly one worker, contiguous ranges, a join barrier at the end.
//! [`RowPartitionPool`] wraps a fixed-size `rayon` pool and hands each worker
//! a disjoint `&mut` chunk of the output rows, so workers never synchronize.
//!
//! A failing worker (error or panic) is logged and counted; its siblings
//! keep running. Rows of a failed partition may be partially written.

use crate::error::{Error, Result};
use std::ops::Range;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Outcome of one partitioned run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolReport {
    /// Number of partitions executed.
    pub partitions: usize,
    /// Partitions whose worker returned an error or panicked.
    pub failed_partitions: usize,
}

impl PoolReport {
    /// Returns true if every partition completed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed_partitions == 0
    }
}

/// Fixed-size pool executing closures over contiguous row ranges.
pub struct RowPartitionPool {
    pool: rayon::ThreadPool,
    threads: usize,
}

impl std::fmt::Debug for RowPartitionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowPartitionPool")
            .field("threads", &self.threads)
            .finish()
    }
}

impl RowPartitionPool {
    /// Creates a pool with `threads` workers (0 = available parallelism).
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorkerPool`] if the threads cannot be spawned.
    pub fn new(threads: usize) -> Result<Self> {
        let threads = if threads == 0 {
            std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
        } else {
            threads
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("knnhub-worker-{i}"))
            .build()
            .map_err(|e| Error::WorkerPool(e.to_string()))?;
        Ok(Self { pool, threads })
    }

    /// Number of worker threads.
    #[must_use]
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Splits `rows` into at most `threads` contiguous, near-equal ranges.
    #[must_use]
    pub fn partitions(&self, rows: usize) -> Vec<Range<usize>> {
        partition_rows(rows, self.threads)
    }

    /// Runs `work` once per partition over the matching chunk of `rows`.
    ///
    /// `work` receives the global row range and the mutable chunk for it;
    /// `chunk[r]` is row `range.start + r`. Blocks until all workers return.
    pub fn for_each_rows<T, F>(&self, rows: &mut [T], work: F) -> PoolReport
    where
        T: Send,
        F: Fn(Range<usize>, &mut [T]) -> Result<()> + Sync,
    {
        let ranges = self.partitions(rows.len());
        let failed = AtomicUsize::new(0);
        let work = &work;
        let failed_ref = &failed;

        self.pool.scope(|scope| {
            let mut rest = rows;
            for range in ranges.iter().cloned() {
                let (chunk, tail) = std::mem::take(&mut rest).split_at_mut(range.len());
                rest = tail;
                scope.spawn(move |_| {
                    let outcome = catch_unwind(AssertUnwindSafe(|| work(range.clone(), chunk)));
                    match outcome {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            tracing::warn!(start = range.start, end = range.end, error = %e, "Worker partition failed");
                            failed_ref.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(_) => {
                            tracing::warn!(start = range.start, end = range.end, "Worker partition panicked");
                            failed_ref.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                });
            }
        });

        let report = PoolReport {
            partitions: ranges.len(),
            failed_partitions: failed.into_inner(),
        };
        tracing::debug!(
            threads = self.threads,
            partitions = report.partitions,
            failed = report.failed_partitions,
            "Partitioned run finished"
        );
        report
    }
}

/// Splits `rows` into at most `parts` contiguous ranges whose sizes differ by at most one.
#[must_use]
pub fn partition_rows(rows: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.clamp(1, rows.max(1));
    let base = rows / parts;
    let extra = rows % parts;
    let mut ranges = Vec::with_capacity(parts);
    let mut start = 0;
    for p in 0..parts {
        let len = base + usize::from(p < extra);
        ranges.push(start..start + len);
        start += len;
    }
    ranges
}
