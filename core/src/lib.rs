//! hashpart core - parallel hash partitioning of key/value records.
//!
//! This crate implements the partitioning phase of an in-memory hash join or
//! hash aggregation: records are routed to `2^h` partitions by the low `h`
//! bits of their key, using one of two strategies:
//!
//! - [`partition_independent`]: each worker fills its own private buffers.
//! - [`partition_concurrent`]: all workers fill one shared set of buffers,
//!   claiming slots with an atomic counter per partition.
//!
//! [`run_benchmark`] drives either strategy end to end and reports elapsed
//! time and throughput.

pub mod benchmark;
pub mod buffer;
pub mod capacity;
pub mod concurrent;
pub mod generator;
pub mod hash;
pub mod independent;
pub mod output;
pub mod slicing;
pub mod timer;
pub mod tuple;
mod worker;

pub use benchmark::{
    BenchmarkReport, PartitionRun, RetriedRun, partition, partition_with_retry, run_benchmark,
    throughput_millions, throughput_per_sec,
};
pub use buffer::{PartitionBuffer, SharedPartitions};
pub use capacity::{CapacityPlan, plan_capacity};
pub use concurrent::{ConcurrentOutput, partition_concurrent};
pub use generator::{generate_tuples, shuffle_tuples};
pub use hash::{RadixHasher, partition_of};
pub use independent::{IndependentOutput, ThreadPartitions, partition_independent};
pub use output::{PartitionSummary, PartitionedOutput};
pub use slicing::{InputSlice, split_input};
pub use timer::Stopwatch;
pub use tuple::Tuple;
pub use worker::AbortSignal;

pub use hashpart_common::{
    AffinityMap, Algorithm, BenchmarkConfig, CapacityPolicy, ErrorStage, Margin, PartitionConfig,
    PartitionError, Result,
};
