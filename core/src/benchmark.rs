//! End-to-end benchmark: generate input, partition it, report throughput.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use hashpart_common::{Algorithm, BenchmarkConfig, CapacityPolicy, PartitionConfig, Result};

use crate::buffer::PartitionBuffer;
use crate::concurrent::{ConcurrentOutput, partition_concurrent};
use crate::generator::{generate_tuples, shuffle_tuples};
use crate::independent::{IndependentOutput, partition_independent};
use crate::output::{PartitionSummary, PartitionedOutput};
use crate::timer::whole_millis;
use crate::tuple::Tuple;

/// Output of whichever strategy a run selected.
#[derive(Debug, Clone)]
pub enum PartitionRun {
    Independent(IndependentOutput),
    Concurrent(ConcurrentOutput),
}

impl PartitionRun {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            PartitionRun::Independent(_) => Algorithm::Independent,
            PartitionRun::Concurrent(_) => Algorithm::Concurrent,
        }
    }

    fn output(&self) -> &dyn PartitionedOutput {
        match self {
            PartitionRun::Independent(output) => output,
            PartitionRun::Concurrent(output) => output,
        }
    }
}

impl PartitionedOutput for PartitionRun {
    fn elapsed(&self) -> Duration {
        self.output().elapsed()
    }

    fn num_partitions(&self) -> usize {
        self.output().num_partitions()
    }

    fn buffers(&self) -> Box<dyn Iterator<Item = (usize, &PartitionBuffer)> + '_> {
        self.output().buffers()
    }
}

/// Partition `input` with `algorithm`.
pub fn partition(algorithm: Algorithm, input: &[Tuple], config: &PartitionConfig) -> Result<PartitionRun> {
    match algorithm {
        Algorithm::Independent => partition_independent(input, config).map(PartitionRun::Independent),
        Algorithm::Concurrent => partition_concurrent(input, config).map(PartitionRun::Concurrent),
    }
}

/// A successful run plus the config that produced it.
#[derive(Debug, Clone)]
pub struct RetriedRun {
    pub run: PartitionRun,
    /// The config of the successful attempt; its capacity policy may be
    /// wider than the one requested.
    pub config: PartitionConfig,
    pub attempts: u32,
}

/// Partition `input`, re-running with a doubled margin when a heuristic
/// capacity overflows, up to `max_retries` times.
///
/// Only [`CapacityPolicy::Heuristic`] runs are retried; a fixed capacity is
/// taken as deliberate.
pub fn partition_with_retry(
    algorithm: Algorithm,
    input: &[Tuple],
    config: &PartitionConfig,
    max_retries: u32,
) -> Result<RetriedRun> {
    let mut config = config.clone();
    let mut attempts = 0;
    loop {
        attempts += 1;
        match partition(algorithm, input, &config) {
            Ok(run) => {
                return Ok(RetriedRun {
                    run,
                    config,
                    attempts,
                });
            }
            Err(err) if err.is_retryable() && attempts <= max_retries => {
                let CapacityPolicy::Heuristic(margin) = config.capacity else {
                    return Err(err);
                };
                let widened = margin.widened();
                tracing::warn!(
                    error = %err,
                    attempt = attempts,
                    factor = widened.factor,
                    "partition overflowed, retrying with a wider margin"
                );
                config.capacity = CapacityPolicy::Heuristic(widened);
            }
            Err(err) => return Err(err),
        }
    }
}

/// Records per second; 0 when nothing was partitioned or no time elapsed.
pub fn throughput_per_sec(num_records: usize, elapsed: Duration) -> f64 {
    if num_records == 0 || elapsed.is_zero() {
        return 0.0;
    }
    num_records as f64 / elapsed.as_secs_f64()
}

/// Throughput in millions of records per second, rounded half up.
pub fn throughput_millions(num_records: usize, elapsed: Duration) -> u64 {
    let per_sec = throughput_per_sec(num_records, elapsed) as u64;
    per_sec.saturating_add(500_000) / 1_000_000
}

/// Measurements of one benchmark run.
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    pub algorithm: Algorithm,
    pub hash_bits: u32,
    pub num_threads: usize,
    pub num_records: usize,
    pub shuffled: bool,
    /// Capacity policy of the successful attempt.
    pub capacity: CapacityPolicy,
    pub attempts: u32,
    pub elapsed_ms: u64,
    pub records_per_sec: f64,
    pub throughput_millions: u64,
    pub summary: PartitionSummary,
}

impl fmt::Display for BenchmarkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const RULE: &str = "-----------------------------------";
        writeln!(f, "{RULE}")?;
        writeln!(f, "Algorithm:     {}", self.algorithm)?;
        writeln!(f, "Hash bits:     {}", self.hash_bits)?;
        writeln!(f, "Threads:       {}", self.num_threads)?;
        writeln!(f, "Tuples:        {}", self.num_records)?;
        if self.attempts > 1 {
            writeln!(f, "Attempts:      {}", self.attempts)?;
        }
        writeln!(f, "{RULE}")?;
        writeln!(f, "Elapsed time: {} ms", self.elapsed_ms)?;
        writeln!(f, "Throughput: {} million tuples/s", self.throughput_millions)?;
        write!(f, "{RULE}")
    }
}

/// Run a full benchmark described by `config`.
///
/// Input generation and buffer setup are not timed; only the partitioning
/// window reported by the partitioner is.
pub fn run_benchmark(config: &BenchmarkConfig) -> Result<BenchmarkReport> {
    config.validate()?;

    let mut input = generate_tuples(config.num_records, config.seed)?;
    if config.shuffle {
        shuffle_tuples(&mut input, config.seed);
    }

    tracing::info!(
        algorithm = %config.algorithm,
        hash_bits = config.partition.hash_bits,
        threads = config.partition.num_threads,
        records = config.num_records,
        shuffled = config.shuffle,
        "starting partitioning benchmark"
    );

    let retried = partition_with_retry(
        config.algorithm,
        &input,
        &config.partition,
        config.overflow_retries,
    )?;
    let elapsed = retried.run.elapsed();

    let report = BenchmarkReport {
        algorithm: config.algorithm,
        hash_bits: config.partition.hash_bits,
        num_threads: config.partition.num_threads,
        num_records: config.num_records,
        shuffled: config.shuffle,
        capacity: retried.config.capacity,
        attempts: retried.attempts,
        elapsed_ms: whole_millis(elapsed),
        records_per_sec: throughput_per_sec(config.num_records, elapsed),
        throughput_millions: throughput_millions(config.num_records, elapsed),
        summary: retried.run.summary(),
    };

    tracing::info!(
        elapsed_ms = report.elapsed_ms,
        throughput_millions = report.throughput_millions,
        attempts = report.attempts,
        "partitioning benchmark finished"
    );
    Ok(report)
}
