//! Shared configuration and error types for the hashpart crates.
//!
//! Nothing in here spawns threads or touches partition buffers; the
//! partitioners live in `hashpart-core`.

pub mod affinity;
pub mod config;
pub mod error;

pub use affinity::AffinityMap;
pub use config::{
    Algorithm, BenchmarkConfig, CapacityPolicy, DEFAULT_NUM_RECORDS, MAX_HASH_BITS, Margin,
    PartitionConfig, PartitionConfigBuilder,
};
pub use error::{ErrorStage, PartitionError, Result};
