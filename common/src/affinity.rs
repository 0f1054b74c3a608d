//! Mapping from logical worker index to the CPU core it should run on.

use serde::{Deserialize, Serialize};

/// Explicit `thread_index -> core_id` table.
///
/// Indices past the end of the table wrap around, so a table describing one
/// socket can be reused for runs with more workers than entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AffinityMap {
    cores: Vec<usize>,
}

impl AffinityMap {
    pub fn new(cores: Vec<usize>) -> Self {
        Self { cores }
    }

    /// Pin thread `i` to core `i`.
    pub fn identity(num_cores: usize) -> Self {
        Self::new((0..num_cores).collect())
    }

    /// Interleave hyper-thread siblings so consecutive workers land on
    /// distinct physical cores first.
    ///
    /// With 32 logical cores where core `c` and `c + 16` are siblings this
    /// yields `0, 16, 2, 18, .., 14, 30, 1, 17, 3, 19, .., 15, 31`.
    pub fn sibling_interleaved(logical_cores: usize) -> Self {
        let half = logical_cores / 2;
        if half == 0 {
            return Self::identity(logical_cores);
        }

        let mut cores = Vec::with_capacity(logical_cores);
        for parity in 0..2 {
            for core in (parity..half).step_by(2) {
                cores.push(core);
                cores.push(core + half);
            }
        }
        // Odd core counts leave the last logical core unpaired.
        if logical_cores % 2 == 1 {
            cores.push(logical_cores - 1);
        }
        Self::new(cores)
    }

    /// The core assigned to worker `thread_index`, if the table is non-empty.
    pub fn core_for(&self, thread_index: usize) -> Option<usize> {
        if self.cores.is_empty() {
            return None;
        }
        Some(self.cores[thread_index % self.cores.len()])
    }

    pub fn len(&self) -> usize {
        self.cores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cores.is_empty()
    }

    pub fn cores(&self) -> &[usize] {
        &self.cores
    }
}
