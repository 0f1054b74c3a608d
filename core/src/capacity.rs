//! Deciding how many records each partition buffer may hold.
//!
//! Two approaches are supported. The exact plan counts every partition in a
//! first pass and allocates exactly, so a run can never overflow. The
//! heuristic plan allocates every buffer at the expected count for uniformly
//! distributed keys times a safety margin; it saves the counting pass but an
//! unlucky or skewed input will overflow it.

use hashpart_common::{Algorithm, CapacityPolicy, ErrorStage, Margin, Result};

use crate::buffer::try_vec_with_capacity;
use crate::hash::RadixHasher;
use crate::tuple::Tuple;

/// The capacity decision for a run, resolved from a [`CapacityPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityPlan {
    /// Count first, then size every buffer to its exact count.
    Exact,
    /// Every buffer gets the same capacity up front.
    Uniform(usize),
}

/// Expected records per partition for each buffer set, assuming uniformly
/// distributed keys: `(total_records / num_threads) / num_partitions`.
pub fn expected_per_partition(
    total_records: usize,
    num_threads: usize,
    num_partitions: usize,
) -> f64 {
    (total_records as f64 / num_threads as f64) / num_partitions as f64
}

/// Capacity of every partition buffer under `margin`:
/// `ceil(expected * factor + floor)`.
///
/// `num_threads` is the number of buffer sets the input is spread over: the
/// worker count for per-thread buffers, `1` for a single shared set.
pub fn plan_capacity(
    total_records: usize,
    num_threads: usize,
    num_partitions: usize,
    margin: Margin,
) -> usize {
    let expected = expected_per_partition(total_records, num_threads, num_partitions);
    let planned = (expected * margin.factor).ceil() + margin.floor as f64;
    // Saturating float-to-int conversion.
    planned as usize
}

/// Resolve `policy` for a run of `algorithm` over `total_records`.
pub fn resolve(
    policy: CapacityPolicy,
    algorithm: Algorithm,
    total_records: usize,
    num_threads: usize,
    num_partitions: usize,
) -> CapacityPlan {
    let buffer_sets = match algorithm {
        Algorithm::Independent => num_threads,
        Algorithm::Concurrent => 1,
    };
    let plan = match policy {
        CapacityPolicy::Exact => CapacityPlan::Exact,
        CapacityPolicy::Fixed(capacity) => CapacityPlan::Uniform(capacity),
        CapacityPolicy::Heuristic(margin) => CapacityPlan::Uniform(plan_capacity(
            total_records,
            buffer_sets,
            num_partitions,
            margin,
        )),
    };
    tracing::debug!(
        %algorithm,
        ?policy,
        ?plan,
        total_records,
        num_threads,
        num_partitions,
        "resolved partition capacity"
    );
    plan
}

/// Count how many of `records` fall into each partition.
pub fn histogram(records: &[Tuple], hasher: &RadixHasher, stage: ErrorStage) -> Result<Vec<usize>> {
    let num_partitions = hasher.num_partitions();
    let mut counts = try_vec_with_capacity(num_partitions, stage, "partition histogram")?;
    counts.resize(num_partitions, 0);
    for record in records {
        counts[hasher.partition_of(record.key)] += 1;
    }
    Ok(counts)
}

/// Element-wise sum of per-thread histograms.
pub fn sum_histograms(histograms: Vec<Vec<usize>>) -> Vec<usize> {
    let mut histograms = histograms.into_iter();
    let Some(mut totals) = histograms.next() else {
        return Vec::new();
    };
    for histogram in histograms {
        debug_assert_eq!(histogram.len(), totals.len());
        for (total, count) in totals.iter_mut().zip(histogram) {
            *total += count;
        }
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_independent_margin() {
        // 2^24 records, 8 threads, 2^10 partitions: 2048 expected.
        let capacity = plan_capacity(1 << 24, 8, 1 << 10, Margin::INDEPENDENT);
        assert_eq!(capacity, 2048 * 3 + 64);
    }

    #[test]
    fn test_concurrent_margin() {
        let capacity = plan_capacity(1000, 1, 4, Margin::CONCURRENT);
        assert_eq!(capacity, 375);
    }

    #[test]
    fn test_small_inputs_round_up() {
        // Less than one record expected per partition still leaves room.
        assert_eq!(plan_capacity(3, 1, 4, Margin::CONCURRENT), 2);
        assert_eq!(plan_capacity(0, 4, 4, Margin::CONCURRENT), 0);
        assert_eq!(plan_capacity(0, 4, 4, Margin::INDEPENDENT), 64);
    }

    #[test]
    fn test_resolve() {
        assert_eq!(
            resolve(CapacityPolicy::Exact, Algorithm::Concurrent, 100, 4, 2),
            CapacityPlan::Exact
        );
        assert_eq!(
            resolve(CapacityPolicy::Fixed(9), Algorithm::Independent, 100, 4, 2),
            CapacityPlan::Uniform(9)
        );
        // Concurrent mode plans for the whole input in one buffer set.
        assert_eq!(
            resolve(
                CapacityPolicy::Heuristic(Margin::new(1.0, 0)),
                Algorithm::Concurrent,
                100,
                4,
                2
            ),
            CapacityPlan::Uniform(50)
        );
        assert_eq!(
            resolve(
                CapacityPolicy::Heuristic(Margin::new(1.0, 0)),
                Algorithm::Independent,
                100,
                4,
                2
            ),
            CapacityPlan::Uniform(13)
        );
    }

    #[test]
    fn test_histogram() {
        let hasher = RadixHasher::new(2);
        let records: Vec<_> = (0..10).map(|k| Tuple::new(k, 0)).collect();
        let counts = histogram(&records, &hasher, ErrorStage::Scan).unwrap();
        assert_eq!(counts, vec![3, 3, 2, 2]);
    }

    #[test]
    fn test_sum_histograms() {
        assert_eq!(
            sum_histograms(vec![vec![1, 2, 3], vec![0, 1, 0], vec![4, 0, 0]]),
            vec![5, 3, 3]
        );
        assert!(sum_histograms(Vec::new()).is_empty());
    }
}
