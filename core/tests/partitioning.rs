//! End-to-end tests of both partitioning strategies

mod common;

use common::{assert_partitioned, config, sequential_tuples, sorted_partitions};
use hashpart_core::{
    AffinityMap, Algorithm, CapacityPolicy, ErrorStage, Margin, PartitionConfig, PartitionError,
    PartitionedOutput, generate_tuples, partition, partition_concurrent, partition_independent,
    shuffle_tuples, throughput_millions,
};

#[test]
fn test_independent_sixteen_keys_four_partitions() {
    let input = sequential_tuples(16);
    let output = partition_independent(&input, &config(2, 4, CapacityPolicy::Exact)).unwrap();

    assert_eq!(output.partition_counts(), vec![4, 4, 4, 4]);
    assert_partitioned(&output, &input, 2);
    for partition in 0..4 {
        let mut keys: Vec<u64> = output
            .partition_records(partition)
            .iter()
            .map(|t| t.key)
            .collect();
        keys.sort_unstable();
        let expected: Vec<u64> = (0..16).filter(|k| k % 4 == partition as u64).collect();
        assert_eq!(keys, expected);
    }
}

#[test]
fn test_concurrent_matches_independent_multisets() {
    let input = sequential_tuples(16);
    let cfg = config(2, 4, CapacityPolicy::Exact);
    let independent = partition_independent(&input, &cfg).unwrap();
    let expected = sorted_partitions(&independent);

    for _ in 0..10 {
        let concurrent = partition_concurrent(&input, &cfg).unwrap();
        assert_partitioned(&concurrent, &input, 2);
        assert_eq!(sorted_partitions(&concurrent), expected);
    }
}

#[test]
fn test_empty_input_for_both_strategies() {
    let cfg = config(3, 4, CapacityPolicy::Exact);
    for algorithm in [Algorithm::Independent, Algorithm::Concurrent] {
        let run = partition(algorithm, &[], &cfg).unwrap();
        assert_eq!(run.partition_counts(), vec![0; 8]);
        assert_eq!(run.total_records(), 0);
        assert_eq!(throughput_millions(run.total_records(), run.elapsed()), 0);
    }
}

#[test]
fn test_capacity_one_overflows() {
    let input = sequential_tuples(100);
    let cfg = config(1, 1, CapacityPolicy::Fixed(1));
    for algorithm in [Algorithm::Independent, Algorithm::Concurrent] {
        let err = partition(algorithm, &input, &cfg).unwrap_err();
        assert!(
            matches!(
                err,
                PartitionError::PartitionOverflow {
                    partition: 0,
                    thread: 0,
                    capacity: 1
                }
            ),
            "{algorithm}: unexpected error {err:?}"
        );
        assert_eq!(err.stage(), ErrorStage::Scan);
        assert!(err.to_string().contains("partition 0"));
    }
}

#[test]
fn test_overflow_with_many_threads_is_still_reported() {
    let input = generate_tuples(50_000, 5).unwrap();
    let cfg = config(4, 8, CapacityPolicy::Fixed(8));
    for algorithm in [Algorithm::Independent, Algorithm::Concurrent] {
        let err = partition(algorithm, &input, &cfg).unwrap_err();
        assert!(matches!(err, PartitionError::PartitionOverflow { capacity: 8, .. }));
    }
}

#[test]
fn test_shuffled_input_with_heuristic_margins() {
    let mut input = generate_tuples(1 << 16, 9).unwrap();
    shuffle_tuples(&mut input, 9);

    for algorithm in [Algorithm::Independent, Algorithm::Concurrent] {
        let cfg = config(6, 4, CapacityPolicy::heuristic_for(algorithm));
        let run = partition(algorithm, &input, &cfg).unwrap();
        assert_partitioned(&run, &input, 6);
    }
}

#[test]
fn test_more_threads_than_records() {
    let input = sequential_tuples(3);
    let cfg = config(1, 8, CapacityPolicy::Exact);

    let independent = partition_independent(&input, &cfg).unwrap();
    assert_eq!(independent.threads.len(), 8);
    assert_partitioned(&independent, &input, 1);
    assert!(independent.thread(7).unwrap().slice.is_empty());

    let concurrent = partition_concurrent(&input, &cfg).unwrap();
    assert_eq!(concurrent.partition_counts(), vec![2, 1]);
}

#[test]
fn test_heuristic_small_input_does_not_underflow_capacity() {
    // Fewer records than partitions: the expected count rounds up to one.
    let input = sequential_tuples(3);
    let cfg = config(3, 1, CapacityPolicy::Heuristic(Margin::CONCURRENT));
    let output = partition_concurrent(&input, &cfg).unwrap();
    assert_partitioned(&output, &input, 3);
}

#[test]
fn test_pinned_workers_produce_same_result() {
    let input = generate_tuples(10_000, 1).unwrap();
    let pinned = PartitionConfig::builder()
        .hash_bits(5)
        .num_threads(4)
        .affinity(AffinityMap::sibling_interleaved(4))
        .build()
        .unwrap();
    let unpinned = config(5, 4, CapacityPolicy::Exact);

    for algorithm in [Algorithm::Independent, Algorithm::Concurrent] {
        let a = partition(algorithm, &input, &pinned).unwrap();
        let b = partition(algorithm, &input, &unpinned).unwrap();
        assert_eq!(sorted_partitions(&a), sorted_partitions(&b));
    }
}

#[test]
fn test_summary_reports_balance() {
    let input: Vec<_> = (0..30).map(|k| hashpart_core::Tuple::new(k * 2, 0)).collect();
    let run = partition(Algorithm::Concurrent, &input, &config(1, 2, CapacityPolicy::Exact)).unwrap();
    let summary = run.summary();
    assert_eq!(summary.total_records, 30);
    assert_eq!(summary.min_records, 0);
    assert_eq!(summary.max_records, 30);
    assert_eq!(summary.mean_records, 15.0);
    assert_eq!(summary.skew, 2.0);
    assert_eq!(summary.max_fill_ratio, 1.0);
}
