//! Synthetic input for benchmarks: sequential keys with random values.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use hashpart_common::{ErrorStage, Result};

use crate::buffer::try_vec_with_capacity;
use crate::tuple::Tuple;

/// Generated values are uniform in `[0, VALUE_RANGE)`.
pub const VALUE_RANGE: u64 = 1000;

/// Records generated per rayon task. Each chunk has its own RNG stream, so
/// the output does not depend on the size of the rayon pool.
const GENERATOR_CHUNK: usize = 1 << 16;

fn chunk_seed(seed: u64, chunk: usize) -> u64 {
    seed ^ (chunk as u64).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Generate `num_records` tuples with keys `0..num_records` in order and
/// pseudo-random values, deterministically from `seed`.
pub fn generate_tuples(num_records: usize, seed: u64) -> Result<Vec<Tuple>> {
    let mut tuples = try_vec_with_capacity(num_records, ErrorStage::Setup, "input buffer")?;
    tuples.resize(num_records, Tuple::default());

    tuples
        .par_chunks_mut(GENERATOR_CHUNK)
        .enumerate()
        .for_each(|(chunk, out)| {
            let mut rng = StdRng::seed_from_u64(chunk_seed(seed, chunk));
            let base = (chunk * GENERATOR_CHUNK) as u64;
            for (offset, tuple) in out.iter_mut().enumerate() {
                *tuple = Tuple::new(base + offset as u64, rng.gen_range(0..VALUE_RANGE));
            }
        });

    tracing::debug!(num_records, seed, "generated input tuples");
    Ok(tuples)
}

/// Fisher-Yates shuffle of `tuples`, deterministic for a given `seed`.
pub fn shuffle_tuples(tuples: &mut [Tuple], seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    tuples.shuffle(&mut rng);
}
