//! Monotonic timing for partitioning runs.

use std::time::{Duration, Instant};

/// A started monotonic timer. Unaffected by wall-clock adjustments.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    started: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Whole milliseconds in `elapsed`, truncated.
pub fn whole_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
