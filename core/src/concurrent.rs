//! Concurrent partitioning: all workers share one set of buffers.
//!
//! A worker claims the next slot of a partition with a single `fetch_add` on
//! that partition's counter and writes the record there. The counters are
//! the only shared mutable state; record order inside a partition depends on
//! thread interleaving.

use std::time::Duration;

use hashpart_common::{Algorithm, ErrorStage, PartitionConfig, PartitionError, Result};

use crate::buffer::{PartitionBuffer, SharedPartitions, allocate_uniform};
use crate::capacity::{self, CapacityPlan};
use crate::hash::RadixHasher;
use crate::output::PartitionedOutput;
use crate::slicing::split_input;
use crate::timer::Stopwatch;
use crate::tuple::Tuple;
use crate::worker::{ABORT_CHECK_INTERVAL, AbortSignal, run_workers};

/// Result of [`partition_concurrent`].
#[derive(Debug, Clone)]
pub struct ConcurrentOutput {
    /// One buffer per partition, indexed by partition.
    pub partitions: Vec<PartitionBuffer>,
    pub elapsed: Duration,
}

impl PartitionedOutput for ConcurrentOutput {
    fn elapsed(&self) -> Duration {
        self.elapsed
    }

    fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    fn buffers(&self) -> Box<dyn Iterator<Item = (usize, &PartitionBuffer)> + '_> {
        Box::new(self.partitions.iter().enumerate())
    }

    fn partition_counts(&self) -> Vec<usize> {
        self.partitions.iter().map(PartitionBuffer::len).collect()
    }
}

/// Partition `input` into one shared set of `2^hash_bits` partitions.
///
/// With [`CapacityPolicy::Exact`](hashpart_common::CapacityPolicy::Exact)
/// the workers first count their slices, the counts are summed, and the
/// shared buffers are allocated at exactly those sizes before the fill pass.
/// Both passes and the allocation between them are timed.
pub fn partition_concurrent(input: &[Tuple], config: &PartitionConfig) -> Result<ConcurrentOutput> {
    config.validate()?;
    let hasher = RadixHasher::from_config(config);
    let num_partitions = hasher.num_partitions();

    if input.is_empty() {
        return Ok(ConcurrentOutput {
            partitions: allocate_uniform(num_partitions, 0, ErrorStage::Setup)?,
            elapsed: Duration::ZERO,
        });
    }

    let slices = split_input(input.len(), config.num_threads);
    let affinity = config.affinity.as_ref();
    let plan = capacity::resolve(
        config.capacity,
        Algorithm::Concurrent,
        input.len(),
        config.num_threads,
        num_partitions,
    );

    let (shared, counting_time) = match plan {
        CapacityPlan::Exact => {
            let counted = run_workers("concurrent-count", slices.clone(), affinity, |_, slice, _| {
                capacity::histogram(&input[slice.range()], &hasher, ErrorStage::Scan)
            })?;
            let watch = Stopwatch::start();
            let totals = capacity::sum_histograms(counted.results);
            let shared = SharedPartitions::allocate(totals, ErrorStage::Scan)?;
            (shared, counted.elapsed + watch.elapsed())
        }
        CapacityPlan::Uniform(capacity) => {
            let capacities = std::iter::repeat_n(capacity, num_partitions);
            (SharedPartitions::allocate(capacities, ErrorStage::Setup)?, Duration::ZERO)
        }
    };

    let filled = run_workers("concurrent", slices, affinity, |thread, slice, abort| {
        fill_shared(&input[slice.range()], &hasher, &shared, thread, abort)
    })?;
    let elapsed = counting_time + filled.elapsed;

    tracing::debug!(
        records = input.len(),
        threads = config.num_threads,
        num_partitions,
        elapsed_us = elapsed.as_micros() as u64,
        "concurrent partitioning finished"
    );

    Ok(ConcurrentOutput {
        partitions: shared.into_buffers(),
        elapsed,
    })
}

/// Claim a slot for every record of `records` in the shared buffers.
fn fill_shared(
    records: &[Tuple],
    hasher: &RadixHasher,
    shared: &SharedPartitions,
    thread: usize,
    abort: &AbortSignal,
) -> Result<()> {
    for chunk in records.chunks(ABORT_CHECK_INTERVAL) {
        if abort.is_raised() {
            return Ok(());
        }
        for record in chunk {
            let partition = hasher.partition_of(record.key);
            if !shared.insert(partition, *record) {
                return Err(PartitionError::overflow(
                    partition,
                    thread,
                    shared.capacity(partition),
                ));
            }
        }
    }
    Ok(())
}
