use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

use hashpart_core::{
    Algorithm, CapacityPolicy, PartitionConfig, generate_tuples, partition, shuffle_tuples,
};

const NUM_RECORDS: usize = 1 << 20;
const HASH_BIT_LEVELS: [u32; 3] = [1, 10, 14];

fn bench_partitioning(c: &mut Criterion) {
    let mut input = generate_tuples(NUM_RECORDS, 0).expect("input generation");
    shuffle_tuples(&mut input, 0);
    let threads = num_threads();

    for algorithm in [Algorithm::Independent, Algorithm::Concurrent] {
        let mut group = c.benchmark_group(format!("partition_{algorithm}"));
        group.throughput(Throughput::Elements(NUM_RECORDS as u64));
        group.sample_size(10);

        for policy in [CapacityPolicy::Exact, CapacityPolicy::heuristic_for(algorithm)] {
            let policy_name = if policy.is_exact() { "exact" } else { "heuristic" };
            for hash_bits in HASH_BIT_LEVELS {
                let config = PartitionConfig::builder()
                    .hash_bits(hash_bits)
                    .num_threads(threads)
                    .capacity(policy)
                    .build()
                    .expect("valid config");
                group.bench_with_input(
                    BenchmarkId::new(policy_name, hash_bits),
                    &config,
                    |b, config| {
                        b.iter(|| {
                            let run = partition(algorithm, black_box(&input), config)
                                .expect("partitioning");
                            black_box(run)
                        })
                    },
                );
            }
        }
        group.finish();
    }
}

fn num_threads() -> usize {
    num_cpus::get().min(8)
}

criterion_group!(benches, bench_partitioning);
criterion_main!(benches);
