//! Spawning, pinning and joining the worker threads of one run.
//!
//! Every run spawns a fresh set of scoped OS threads and joins all of them
//! before returning. Workers block on a start gate until every thread has
//! been created, so a failed spawn never leaves partial work behind, and the
//! timed window covers only the scan itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use hashpart_common::{AffinityMap, PartitionError, Result};

use crate::timer::Stopwatch;

/// Records scanned between two checks of the abort signal.
pub(crate) const ABORT_CHECK_INTERVAL: usize = 4096;

/// Raised by the first worker that fails; the others stop early.
#[derive(Debug, Default)]
pub struct AbortSignal {
    raised: AtomicBool,
}

impl AbortSignal {
    pub fn raise(&self) {
        self.raised.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Relaxed)
    }
}

/// One-shot gate: workers wait until it is opened to either start or quit.
#[derive(Debug, Default)]
struct StartGate {
    state: Mutex<Option<bool>>,
    opened: Condvar,
}

impl StartGate {
    fn open(&self, proceed: bool) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = Some(proceed);
        self.opened.notify_all();
    }

    /// Block until the gate opens; `true` means start working.
    fn wait(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(proceed) = *state {
                return proceed;
            }
            state = self
                .opened
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Results of every worker in thread order, plus the time from opening the
/// start gate to the last join.
#[derive(Debug)]
pub(crate) struct WorkerRun<T> {
    pub results: Vec<T>,
    pub elapsed: Duration,
}

/// Pin the calling thread to `core`. Failure only costs locality, so it is
/// logged and otherwise ignored.
fn pin_current_thread(thread: usize, core: usize) {
    let pinned = core_affinity::set_for_current(core_affinity::CoreId { id: core });
    if pinned {
        tracing::debug!(thread, core, "pinned worker");
    } else {
        tracing::warn!(thread, core, "could not pin worker to core, running unpinned");
    }
}

/// Run `work` on one fresh thread per element of `states`.
///
/// Worker `i` receives `states[i]`. The first error in thread order is
/// returned; a worker that fails raises the shared [`AbortSignal`] so the
/// others can stop early.
pub(crate) fn run_workers<S, T, F>(
    label: &str,
    states: Vec<S>,
    affinity: Option<&AffinityMap>,
    work: F,
) -> Result<WorkerRun<T>>
where
    S: Send,
    T: Send,
    F: Fn(usize, S, &AbortSignal) -> Result<T> + Sync,
{
    let gate = StartGate::default();
    let abort = AbortSignal::default();

    thread::scope(|scope| {
        let num_workers = states.len();
        let mut handles = Vec::with_capacity(num_workers);

        for (thread, state) in states.into_iter().enumerate() {
            let core = affinity.and_then(|map| map.core_for(thread));
            let (gate, abort, work) = (&gate, &abort, &work);

            let spawned = std::thread::Builder::new()
                .name(format!("{label}-{thread}"))
                .spawn_scoped(scope, move || {
                    if let Some(core) = core {
                        pin_current_thread(thread, core);
                    }
                    if !gate.wait() {
                        return Ok(None);
                    }
                    let result = work(thread, state, abort);
                    if result.is_err() {
                        abort.raise();
                    }
                    result.map(Some)
                });

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(source) => {
                    // Release the workers already spawned without letting
                    // them scan; the scope joins them on the way out.
                    gate.open(false);
                    return Err(PartitionError::ThreadCreationFailure { thread, source });
                }
            }
        }

        let watch = Stopwatch::start();
        gate.open(true);

        let mut results = Vec::with_capacity(num_workers);
        let mut first_error = None;
        for (thread, handle) in handles.into_iter().enumerate() {
            let outcome = match handle.join() {
                Ok(outcome) => outcome,
                Err(_) => {
                    abort.raise();
                    Err(PartitionError::WorkerPanicked { thread })
                }
            };
            match outcome {
                Ok(Some(result)) => results.push(result),
                // Only produced when the gate opens with `false`.
                Ok(None) => {}
                Err(err) => {
                    if first_error.is_none() {
                        tracing::error!(thread, error = %err, "{label} worker failed");
                        first_error = Some(err);
                    }
                }
            }
        }
        let elapsed = watch.elapsed();

        match first_error {
            Some(err) => Err(err),
            None => Ok(WorkerRun { results, elapsed }),
        }
    })
}
