//! `partition` - benchmark the independent and concurrent partitioners.
//!
//! ```bash
//! partition independent 10 8
//! partition concurrent 18 8 16777216 --shuffle --capacity heuristic
//! RUST_LOG=debug partition con 4 2 1024 --format json
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use hashpart_common::{
    AffinityMap, Algorithm, BenchmarkConfig, CapacityPolicy, DEFAULT_NUM_RECORDS, PartitionConfig,
};
use hashpart_core::run_benchmark;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Partition 2^h buckets of key/value tuples with multiple threads and
/// report elapsed time and throughput.
#[derive(Debug, Parser)]
#[command(name = "partition", version)]
struct Cli {
    /// Partitioning algorithm: independent (ind) or concurrent (con)
    #[arg(required_unless_present = "config", conflicts_with = "config")]
    algorithm: Option<Algorithm>,

    /// Number of low key bits used to pick a partition
    #[arg(required_unless_present = "config", conflicts_with = "config")]
    hash_bits: Option<u32>,

    /// Number of worker threads
    #[arg(required_unless_present = "config", conflicts_with = "config")]
    threads: Option<usize>,

    /// Number of tuples to partition [default: 2^24]
    #[arg(conflicts_with = "config")]
    n_tuples: Option<usize>,

    /// Load the benchmark configuration from a JSON file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Shuffle the generated keys before partitioning
    #[arg(long)]
    shuffle: bool,

    /// Seed for value generation and shuffling
    #[arg(long)]
    seed: Option<u64>,

    /// Buffer sizing: exact, heuristic, heuristic:<factor>[+<floor>], or a
    /// fixed per-partition record count
    #[arg(long, value_name = "POLICY")]
    capacity: Option<String>,

    /// Pin workers to cores: a comma separated core list, `linear`, or
    /// `siblings` to interleave hyper-thread siblings
    #[arg(long, value_name = "CORES")]
    affinity: Option<String>,

    /// Re-run an overflowing heuristic run this many times with a wider margin
    #[arg(long)]
    retries: Option<u32>,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

impl Cli {
    fn into_config(self) -> Result<BenchmarkConfig> {
        let mut config = match &self.config {
            Some(path) => BenchmarkConfig::from_json_file(path)?,
            None => {
                // clap enforces presence when no config file is given.
                let (Some(algorithm), Some(hash_bits), Some(threads)) =
                    (self.algorithm, self.hash_bits, self.threads)
                else {
                    bail!("algorithm, hash_bits and threads are required");
                };
                let partition = PartitionConfig {
                    hash_bits,
                    num_threads: threads,
                    capacity: CapacityPolicy::Exact,
                    affinity: None,
                };
                BenchmarkConfig::new(algorithm, partition)
                    .with_num_records(self.n_tuples.unwrap_or(DEFAULT_NUM_RECORDS))
            }
        };

        if self.shuffle {
            config.shuffle = true;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(retries) = self.retries {
            config.overflow_retries = retries;
        }
        if let Some(capacity) = &self.capacity {
            config.partition.capacity = CapacityPolicy::parse(capacity, config.algorithm)
                .map_err(anyhow::Error::msg)?;
        }
        if let Some(affinity) = &self.affinity {
            config.partition.affinity = Some(parse_affinity(affinity)?);
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_affinity(spec: &str) -> Result<AffinityMap> {
    match spec.trim() {
        "siblings" => Ok(AffinityMap::sibling_interleaved(num_cpus::get())),
        "linear" => Ok(AffinityMap::identity(num_cpus::get())),
        list => {
            let cores = list
                .split(',')
                .map(|core| {
                    core.trim()
                        .parse::<usize>()
                        .with_context(|| format!("invalid core id '{core}'"))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(AffinityMap::new(cores))
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let format = cli.format;
    let config = cli.into_config()?;
    tracing::debug!(?config, "resolved benchmark config");
    let report = run_benchmark(&config).context("partitioning failed")?;

    match format {
        OutputFormat::Text => println!("{report}"),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
