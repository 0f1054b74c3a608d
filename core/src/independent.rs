//! Independent partitioning: every worker owns a private set of buffers.
//!
//! Workers scan disjoint slices and append into their own buffers, so the
//! scan needs no synchronization at all. Combining the per-thread buffers of
//! a partition is left to the consumer.

use std::time::Duration;

use hashpart_common::{Algorithm, ErrorStage, PartitionConfig, PartitionError, Result};

use crate::buffer::{PartitionBuffer, allocate_exact, allocate_uniform, try_vec_with_capacity};
use crate::capacity::{self, CapacityPlan};
use crate::hash::RadixHasher;
use crate::output::PartitionedOutput;
use crate::slicing::{InputSlice, split_input};
use crate::tuple::Tuple;
use crate::worker::{ABORT_CHECK_INTERVAL, AbortSignal, run_workers};

/// The private buffers of one worker.
#[derive(Debug, Clone)]
pub struct ThreadPartitions {
    /// The input range this worker scanned.
    pub slice: InputSlice,
    /// One buffer per partition, indexed by partition.
    pub partitions: Vec<PartitionBuffer>,
}

/// Result of [`partition_independent`].
#[derive(Debug, Clone)]
pub struct IndependentOutput {
    pub threads: Vec<ThreadPartitions>,
    pub elapsed: Duration,
    num_partitions: usize,
}

impl IndependentOutput {
    /// Buffers written by worker `thread`.
    pub fn thread(&self, thread: usize) -> Option<&ThreadPartitions> {
        self.threads.get(thread)
    }
}

impl PartitionedOutput for IndependentOutput {
    fn elapsed(&self) -> Duration {
        self.elapsed
    }

    fn num_partitions(&self) -> usize {
        self.num_partitions
    }

    fn buffers(&self) -> Box<dyn Iterator<Item = (usize, &PartitionBuffer)> + '_> {
        Box::new(
            self.threads
                .iter()
                .flat_map(|thread| thread.partitions.iter().enumerate()),
        )
    }
}

/// Partition `input` into `2^hash_bits` partitions per worker.
pub fn partition_independent(input: &[Tuple], config: &PartitionConfig) -> Result<IndependentOutput> {
    config.validate()?;
    let hasher = RadixHasher::from_config(config);
    let num_partitions = hasher.num_partitions();
    let slices = split_input(input.len(), config.num_threads);

    if input.is_empty() {
        return empty_output(slices, num_partitions);
    }

    let plan = capacity::resolve(
        config.capacity,
        Algorithm::Independent,
        input.len(),
        config.num_threads,
        num_partitions,
    );
    let affinity = config.affinity.as_ref();

    let run = match plan {
        CapacityPlan::Exact => run_workers("independent", slices, affinity, |thread, slice, abort| {
            let records = &input[slice.range()];
            let counts = capacity::histogram(records, &hasher, ErrorStage::Scan)?;
            let mut partitions = allocate_exact(&counts, ErrorStage::Scan)?;
            scan_slice(records, &hasher, &mut partitions, thread, abort)?;
            Ok(ThreadPartitions { slice, partitions })
        })?,
        CapacityPlan::Uniform(capacity) => {
            let mut states = try_vec_with_capacity(slices.len(), ErrorStage::Setup, "thread table")?;
            for slice in slices {
                states.push((slice, allocate_uniform(num_partitions, capacity, ErrorStage::Setup)?));
            }
            run_workers(
                "independent",
                states,
                affinity,
                |thread, (slice, mut partitions), abort| {
                    scan_slice(&input[slice.range()], &hasher, &mut partitions, thread, abort)?;
                    Ok(ThreadPartitions { slice, partitions })
                },
            )?
        }
    };

    tracing::debug!(
        records = input.len(),
        threads = config.num_threads,
        num_partitions,
        elapsed_us = run.elapsed.as_micros() as u64,
        "independent partitioning finished"
    );

    Ok(IndependentOutput {
        threads: run.results,
        elapsed: run.elapsed,
        num_partitions,
    })
}

/// Append every record of `records` to its partition's buffer.
fn scan_slice(
    records: &[Tuple],
    hasher: &RadixHasher,
    partitions: &mut [PartitionBuffer],
    thread: usize,
    abort: &AbortSignal,
) -> Result<()> {
    for chunk in records.chunks(ABORT_CHECK_INTERVAL) {
        if abort.is_raised() {
            return Ok(());
        }
        for record in chunk {
            let partition = hasher.partition_of(record.key);
            let buffer = &mut partitions[partition];
            if !buffer.try_push(*record) {
                return Err(PartitionError::overflow(partition, thread, buffer.capacity()));
            }
        }
    }
    Ok(())
}

fn empty_output(slices: Vec<InputSlice>, num_partitions: usize) -> Result<IndependentOutput> {
    let mut threads = try_vec_with_capacity(slices.len(), ErrorStage::Setup, "thread table")?;
    for slice in slices {
        threads.push(ThreadPartitions {
            slice,
            partitions: allocate_uniform(num_partitions, 0, ErrorStage::Setup)?,
        });
    }
    Ok(IndependentOutput {
        threads,
        elapsed: Duration::ZERO,
        num_partitions,
    })
}
