//! Common test utilities and helpers for integration tests

use hashpart_core::{CapacityPolicy, PartitionConfig, PartitionedOutput, Tuple};

/// Records with keys `0..n` and a value derived from the key
#[allow(dead_code)] // Used in partitioning.rs but not in properties.rs
pub fn sequential_tuples(n: u64) -> Vec<Tuple> {
    (0..n).map(|k| Tuple::new(k, k % 1000)).collect()
}

/// Build a validated config
pub fn config(hash_bits: u32, threads: usize, capacity: CapacityPolicy) -> PartitionConfig {
    PartitionConfig::builder()
        .hash_bits(hash_bits)
        .num_threads(threads)
        .capacity(capacity)
        .build()
        .unwrap()
}

/// Every partition's records, each sorted, so runs can be compared as
/// multisets regardless of in-partition order
pub fn sorted_partitions<O: PartitionedOutput + ?Sized>(output: &O) -> Vec<Vec<Tuple>> {
    (0..output.num_partitions())
        .map(|p| {
            let mut records = output.partition_records(p);
            records.sort_unstable();
            records
        })
        .collect()
}

/// Assert that the output holds exactly `input` as a multiset and that every
/// record sits in the partition its key maps to
pub fn assert_partitioned<O: PartitionedOutput + ?Sized>(output: &O, input: &[Tuple], hash_bits: u32) {
    let mask = (1u64 << hash_bits) - 1;
    for (partition, buffer) in output.buffers() {
        assert!(
            buffer.len() <= buffer.capacity(),
            "partition {partition} holds {} records over capacity {}",
            buffer.len(),
            buffer.capacity()
        );
        for record in buffer.records() {
            assert_eq!(
                (record.key & mask) as usize,
                partition,
                "record {record:?} in wrong partition"
            );
        }
    }

    let mut actual: Vec<Tuple> = output
        .buffers()
        .flat_map(|(_, buffer)| buffer.records().iter().copied())
        .collect();
    let mut expected = input.to_vec();
    actual.sort_unstable();
    expected.sort_unstable();
    assert_eq!(actual, expected);
}
