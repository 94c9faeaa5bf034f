//! Trailing-edge debouncer for async work.
//!
//! Each [`Debouncer::trigger`] cancels the pending run, if any, and schedules
//! a new one after the quiet period. Once a run has started it is detached
//! from the debouncer and always completes, so two runs may overlap when a
//! trigger arrives while one is executing.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

#[derive(Default)]
struct State {
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

type Shared = Arc<Mutex<State>>;

fn lock(state: &Shared) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Collapses bursts of triggers into one run.
pub struct Debouncer {
    delay: Duration,
    state: Shared,
}

impl Debouncer {
    /// A debouncer with the given quiet period.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: Shared::default(),
        }
    }

    /// The quiet period.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `run` after the quiet period, superseding any pending run.
    ///
    /// Must be called from within a tokio runtime; outside one the trigger
    /// is dropped with a warning.
    pub fn trigger<F>(&self, run: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("debounced trigger outside a tokio runtime ignored");
            return;
        };

        let mut state = lock(&self.state);
        state.generation += 1;
        let generation = state.generation;
        if let Some(previous) = state.pending.take() {
            previous.abort();
        }

        let shared = Arc::clone(&self.state);
        let delay = self.delay;
        state.pending = Some(handle.spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut state = lock(&shared);
                if state.generation != generation {
                    return;
                }
                // past this point the run can no longer be aborted
                state.pending = None;
            }
            run.await;
        }));
    }

    /// Cancel the pending run, if any. A run already executing continues.
    pub fn cancel(&self) {
        let mut state = lock(&self.state);
        state.generation += 1;
        if let Some(pending) = state.pending.take() {
            pending.abort();
        }
    }

    /// True while a run is scheduled but has not started.
    pub fn is_pending(&self) -> bool {
        lock(&self.state).pending.is_some()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
