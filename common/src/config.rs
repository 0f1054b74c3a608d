//! Configuration for partitioning runs and benchmarks.
//!
//! All configuration is validated once, before any buffer is allocated or
//! any worker is spawned. The partitioners assume a validated config and do
//! not re-check it per record.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::affinity::AffinityMap;
use crate::error::{PartitionError, Result};

/// Largest supported hash-bit count; `2^h` must fit the partition index.
pub const MAX_HASH_BITS: u32 = 62;

/// Default record count for benchmarks: 2^24.
pub const DEFAULT_NUM_RECORDS: usize = 1 << 24;

/// Partitioning strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// Every worker owns a private set of partition buffers.
    Independent,
    /// All workers share one set of buffers and claim slots atomically.
    Concurrent,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Independent => "independent",
            Algorithm::Concurrent => "concurrent",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "independent" | "ind" => Ok(Algorithm::Independent),
            "concurrent" | "con" => Ok(Algorithm::Concurrent),
            other => Err(format!(
                "unknown algorithm '{other}', expected 'independent' or 'concurrent'"
            )),
        }
    }
}

/// Safety margin applied over the expected per-partition record count.
///
/// This is a tuning constant, not a probabilistic bound: the expected count
/// assumes uniformly distributed keys, and skewed inputs can exceed any
/// fixed margin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margin {
    /// Multiplier over the expected count.
    pub factor: f64,
    /// Records added after scaling.
    pub floor: usize,
}

impl Margin {
    /// Per-thread buffers. 1.5x was observed to overflow on shuffled input.
    pub const INDEPENDENT: Margin = Margin {
        factor: 3.0,
        floor: 64,
    };

    /// Shared buffers see the whole input, so variance is relatively smaller.
    pub const CONCURRENT: Margin = Margin {
        factor: 1.5,
        floor: 0,
    };

    pub fn new(factor: f64, floor: usize) -> Self {
        Self { factor, floor }
    }

    /// Double the multiplier, used when retrying after an overflow.
    pub fn widened(&self) -> Self {
        Self {
            factor: self.factor * 2.0,
            floor: self.floor,
        }
    }

    /// Default margin for `algorithm`.
    pub fn for_algorithm(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Independent => Self::INDEPENDENT,
            Algorithm::Concurrent => Self::CONCURRENT,
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.factor.is_finite() || self.factor < 1.0 {
            return Err(PartitionError::invalid_configuration(format!(
                "capacity margin factor must be a finite value >= 1.0, got {}",
                self.factor
            )));
        }
        Ok(())
    }
}

/// How partition buffer capacities are decided.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CapacityPolicy {
    /// Count every partition first, then allocate exactly. Overflow cannot
    /// happen.
    #[default]
    Exact,
    /// Single pass with buffers sized from the expected count plus a margin.
    Heuristic(Margin),
    /// Single pass with every buffer sized to this many records.
    Fixed(usize),
}

impl CapacityPolicy {
    /// Heuristic policy with the default margin for `algorithm`.
    pub fn heuristic_for(algorithm: Algorithm) -> Self {
        CapacityPolicy::Heuristic(Margin::for_algorithm(algorithm))
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, CapacityPolicy::Exact)
    }

    fn validate(&self) -> Result<()> {
        match self {
            CapacityPolicy::Exact => Ok(()),
            CapacityPolicy::Heuristic(margin) => margin.validate(),
            CapacityPolicy::Fixed(0) => Err(PartitionError::invalid_configuration(
                "fixed partition capacity must be positive",
            )),
            CapacityPolicy::Fixed(_) => Ok(()),
        }
    }

    /// Parse `exact`, `heuristic`, `heuristic:<factor>[+<floor>]` or a plain
    /// per-partition record count. Bare `heuristic` takes the preset margin
    /// for `algorithm`.
    pub fn parse(s: &str, algorithm: Algorithm) -> std::result::Result<Self, String> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("exact") {
            return Ok(CapacityPolicy::Exact);
        }
        if s.eq_ignore_ascii_case("heuristic") {
            return Ok(CapacityPolicy::heuristic_for(algorithm));
        }
        if let Some(spec) = s.strip_prefix("heuristic:") {
            let (factor, floor) = spec.split_once('+').unwrap_or((spec, "0"));
            let factor = factor
                .trim()
                .parse::<f64>()
                .map_err(|e| format!("invalid margin factor '{factor}': {e}"))?;
            let floor = floor
                .trim()
                .parse::<usize>()
                .map_err(|e| format!("invalid margin floor '{floor}': {e}"))?;
            return Ok(CapacityPolicy::Heuristic(Margin::new(factor, floor)));
        }
        s.parse::<usize>()
            .map(CapacityPolicy::Fixed)
            .map_err(|_| format!("invalid capacity policy '{s}'"))
    }
}

/// Parameters for a single partitioning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionConfig {
    /// Number of low key bits used to pick a partition.
    pub hash_bits: u32,
    /// Number of worker threads spawned for the run.
    pub num_threads: usize,
    #[serde(default)]
    pub capacity: CapacityPolicy,
    /// Optional CPU pinning for workers.
    #[serde(default)]
    pub affinity: Option<AffinityMap>,
}

impl PartitionConfig {
    pub fn builder() -> PartitionConfigBuilder {
        PartitionConfigBuilder::new()
    }

    /// Number of partitions, `2^hash_bits`.
    pub fn num_partitions(&self) -> usize {
        1usize << self.hash_bits
    }

    pub fn validate(&self) -> Result<()> {
        if self.hash_bits == 0 {
            return Err(PartitionError::invalid_configuration(
                "hash_bits must be positive",
            ));
        }
        if self.hash_bits > MAX_HASH_BITS || self.hash_bits >= usize::BITS {
            return Err(PartitionError::invalid_configuration(format!(
                "hash_bits must be at most {}, got {}",
                MAX_HASH_BITS.min(usize::BITS - 1),
                self.hash_bits
            )));
        }
        if self.num_threads == 0 {
            return Err(PartitionError::invalid_configuration(
                "num_threads must be positive",
            ));
        }
        if let Some(affinity) = &self.affinity {
            if affinity.is_empty() {
                return Err(PartitionError::invalid_configuration(
                    "affinity map must list at least one core",
                ));
            }
        }
        self.capacity.validate()
    }
}

/// Builder for [`PartitionConfig`].
#[derive(Debug, Clone)]
pub struct PartitionConfigBuilder {
    config: PartitionConfig,
}

impl PartitionConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: PartitionConfig {
                hash_bits: 1,
                num_threads: 1,
                capacity: CapacityPolicy::Exact,
                affinity: None,
            },
        }
    }

    pub fn hash_bits(mut self, hash_bits: u32) -> Self {
        self.config.hash_bits = hash_bits;
        self
    }

    pub fn num_threads(mut self, num_threads: usize) -> Self {
        self.config.num_threads = num_threads;
        self
    }

    pub fn capacity(mut self, capacity: CapacityPolicy) -> Self {
        self.config.capacity = capacity;
        self
    }

    pub fn affinity(mut self, affinity: AffinityMap) -> Self {
        self.config.affinity = Some(affinity);
        self
    }

    /// Validate and return the config.
    pub fn build(self) -> Result<PartitionConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for PartitionConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Parameters for an end-to-end benchmark run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    pub algorithm: Algorithm,
    #[serde(flatten)]
    pub partition: PartitionConfig,
    #[serde(default = "default_num_records")]
    pub num_records: usize,
    /// Shuffle the generated keys before partitioning.
    #[serde(default)]
    pub shuffle: bool,
    #[serde(default)]
    pub seed: u64,
    /// How many times an overflowing heuristic run is retried with a wider
    /// margin.
    #[serde(default)]
    pub overflow_retries: u32,
}

fn default_num_records() -> usize {
    DEFAULT_NUM_RECORDS
}

impl BenchmarkConfig {
    pub fn new(algorithm: Algorithm, partition: PartitionConfig) -> Self {
        Self {
            algorithm,
            partition,
            num_records: DEFAULT_NUM_RECORDS,
            shuffle: false,
            seed: 0,
            overflow_retries: 0,
        }
    }

    pub fn with_num_records(mut self, num_records: usize) -> Self {
        self.num_records = num_records;
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_overflow_retries(mut self, retries: u32) -> Self {
        self.overflow_retries = retries;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_records == 0 {
            return Err(PartitionError::invalid_configuration(
                "num_records must be positive",
            ));
        }
        self.partition.validate()
    }

    /// Load and validate a benchmark config from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let load_error = |message: String| PartitionError::ConfigLoad {
            path: path.display().to_string(),
            message,
        };

        let raw = std::fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
        let config: BenchmarkConfig =
            serde_json::from_str(&raw).map_err(|e| load_error(e.to_string()))?;
        config.validate()?;
        tracing::debug!(path = %path.display(), ?config, "loaded benchmark config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builder_defaults_and_validation() {
        let config = PartitionConfig::builder()
            .hash_bits(4)
            .num_threads(8)
            .build()
            .unwrap();
        assert_eq!(config.num_partitions(), 16);
        assert_eq!(config.capacity, CapacityPolicy::Exact);
        assert!(config.affinity.is_none());
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            PartitionConfig::builder().hash_bits(0).build(),
            Err(PartitionError::InvalidConfiguration { .. })
        ));
        assert!(
            PartitionConfig::builder()
                .hash_bits(MAX_HASH_BITS + 1)
                .build()
                .is_err()
        );
        assert!(PartitionConfig::builder().num_threads(0).build().is_err());
        assert!(
            PartitionConfig::builder()
                .capacity(CapacityPolicy::Fixed(0))
                .build()
                .is_err()
        );
        assert!(
            PartitionConfig::builder()
                .capacity(CapacityPolicy::Heuristic(Margin::new(0.5, 0)))
                .build()
                .is_err()
        );
        assert!(
            PartitionConfig::builder()
                .capacity(CapacityPolicy::Heuristic(Margin::new(f64::NAN, 0)))
                .build()
                .is_err()
        );
        assert!(
            PartitionConfig::builder()
                .affinity(AffinityMap::new(Vec::new()))
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_algorithm_parsing() {
        assert_eq!("independent".parse::<Algorithm>(), Ok(Algorithm::Independent));
        assert_eq!("ind".parse::<Algorithm>(), Ok(Algorithm::Independent));
        assert_eq!("Concurrent".parse::<Algorithm>(), Ok(Algorithm::Concurrent));
        assert_eq!("con".parse::<Algorithm>(), Ok(Algorithm::Concurrent));
        assert!("radix".parse::<Algorithm>().is_err());
        assert_eq!(Algorithm::Concurrent.to_string(), "concurrent");
    }

    #[test]
    fn test_capacity_policy_parsing() {
        let parse = |s| CapacityPolicy::parse(s, Algorithm::Concurrent);
        assert_eq!(parse("exact"), Ok(CapacityPolicy::Exact));
        assert_eq!(parse("128"), Ok(CapacityPolicy::Fixed(128)));
        assert_eq!(
            parse("heuristic"),
            Ok(CapacityPolicy::Heuristic(Margin::CONCURRENT))
        );
        assert_eq!(
            CapacityPolicy::parse("heuristic", Algorithm::Independent),
            Ok(CapacityPolicy::Heuristic(Margin::INDEPENDENT))
        );
        assert_eq!(
            parse("heuristic:1.5"),
            Ok(CapacityPolicy::Heuristic(Margin::new(1.5, 0)))
        );
        assert_eq!(
            parse("heuristic:3+64"),
            Ok(CapacityPolicy::Heuristic(Margin::new(3.0, 64)))
        );
        assert!(parse("heuristic:x").is_err());
        assert!(parse("lots").is_err());
    }

    #[test]
    fn test_margin_widening() {
        let margin = Margin::CONCURRENT.widened();
        assert_eq!(margin.factor, 3.0);
        assert_eq!(margin.floor, 0);
        assert_eq!(Margin::for_algorithm(Algorithm::Independent), Margin::INDEPENDENT);
    }

    #[test]
    fn test_benchmark_config_requires_records() {
        let partition = PartitionConfig::builder().build().unwrap();
        let config = BenchmarkConfig::new(Algorithm::Independent, partition).with_num_records(0);
        assert!(matches!(
            config.validate(),
            Err(PartitionError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "algorithm": "concurrent",
                "hash_bits": 10,
                "num_threads": 4,
                "capacity": {{ "heuristic": {{ "factor": 2.0, "floor": 16 }} }},
                "affinity": [0, 2, 4, 6],
                "num_records": 4096,
                "shuffle": true
            }}"#
        )
        .unwrap();

        let config = BenchmarkConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.algorithm, Algorithm::Concurrent);
        assert_eq!(config.partition.hash_bits, 10);
        assert_eq!(config.partition.num_threads, 4);
        assert_eq!(
            config.partition.capacity,
            CapacityPolicy::Heuristic(Margin::new(2.0, 16))
        );
        assert_eq!(
            config.partition.affinity,
            Some(AffinityMap::new(vec![0, 2, 4, 6]))
        );
        assert_eq!(config.num_records, 4096);
        assert!(config.shuffle);
        assert_eq!(config.seed, 0);
        assert_eq!(config.overflow_retries, 0);
    }

    #[test]
    fn test_from_json_file_errors() {
        let missing = BenchmarkConfig::from_json_file("/definitely/not/here.json");
        assert!(matches!(missing, Err(PartitionError::ConfigLoad { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "algorithm": "concurrent", "hash_bits": 0, "num_threads": 1 }}"#).unwrap();
        assert!(matches!(
            BenchmarkConfig::from_json_file(file.path()),
            Err(PartitionError::InvalidConfiguration { .. })
        ));
    }
}
