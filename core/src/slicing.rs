//! Splitting the input into one contiguous slice per worker.

use std::ops::Range;

use serde::Serialize;

/// The half-open range of input records scanned by one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InputSlice {
    pub thread: usize,
    pub start: usize,
    pub end: usize,
}

impl InputSlice {
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Split `num_records` into `num_threads` contiguous slices.
///
/// The first `num_records % num_threads` slices get one extra record, so
/// slice sizes differ by at most one. When there are fewer records than
/// threads the trailing slices are empty. `num_threads` must be positive.
pub fn split_input(num_records: usize, num_threads: usize) -> Vec<InputSlice> {
    debug_assert!(num_threads > 0);
    let per_thread = num_records / num_threads;
    let remainder = num_records % num_threads;

    let mut slices = Vec::with_capacity(num_threads);
    let mut start = 0;
    for thread in 0..num_threads {
        let extra = usize::from(thread < remainder);
        let end = start + per_thread + extra;
        slices.push(InputSlice { thread, start, end });
        start = end;
    }
    slices
}
