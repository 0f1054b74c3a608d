//! Common view over the results of both partitioning strategies.

use std::time::Duration;

use serde::Serialize;

use crate::buffer::PartitionBuffer;
use crate::tuple::Tuple;

/// Read access to the partition buffers produced by a run.
pub trait PartitionedOutput {
    /// Time spent partitioning, excluding setup.
    fn elapsed(&self) -> Duration;

    fn num_partitions(&self) -> usize;

    /// Every buffer of the run with the partition it belongs to. Independent
    /// runs yield one buffer per partition per thread.
    fn buffers(&self) -> Box<dyn Iterator<Item = (usize, &PartitionBuffer)> + '_>;

    /// Records per partition, summed over all buffer sets.
    fn partition_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.num_partitions()];
        for (partition, buffer) in self.buffers() {
            counts[partition] += buffer.len();
        }
        counts
    }

    fn total_records(&self) -> usize {
        self.buffers().map(|(_, buffer)| buffer.len()).sum()
    }

    /// All records routed to `partition`, in no particular order.
    fn partition_records(&self, partition: usize) -> Vec<Tuple> {
        self.buffers()
            .filter(|(p, _)| *p == partition)
            .flat_map(|(_, buffer)| buffer.records().iter().copied())
            .collect()
    }

    /// Distribution statistics for the run.
    fn summary(&self) -> PartitionSummary {
        PartitionSummary::from_output(self)
    }
}

/// Balance of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionSummary {
    pub num_partitions: usize,
    pub total_records: usize,
    pub min_records: usize,
    pub max_records: usize,
    pub mean_records: f64,
    /// `max_records / mean_records`; 1.0 is perfectly balanced.
    pub skew: f64,
    /// Highest `len / capacity` over all buffers.
    pub max_fill_ratio: f64,
}

impl PartitionSummary {
    fn from_output<O: PartitionedOutput + ?Sized>(output: &O) -> Self {
        let counts = output.partition_counts();
        let total_records: usize = counts.iter().sum();
        let min_records = counts.iter().copied().min().unwrap_or(0);
        let max_records = counts.iter().copied().max().unwrap_or(0);
        let mean_records = if counts.is_empty() {
            0.0
        } else {
            total_records as f64 / counts.len() as f64
        };
        let skew = if mean_records > 0.0 {
            max_records as f64 / mean_records
        } else {
            0.0
        };
        let max_fill_ratio = output
            .buffers()
            .filter(|(_, buffer)| buffer.capacity() > 0)
            .map(|(_, buffer)| buffer.len() as f64 / buffer.capacity() as f64)
            .fold(0.0, f64::max);

        Self {
            num_partitions: counts.len(),
            total_records,
            min_records,
            max_records,
            mean_records,
            skew,
            max_fill_ratio,
        }
    }
}
