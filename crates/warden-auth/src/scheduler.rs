//! Owned timer tracking
//!
//! Every background task the controller or gate spawns is registered in a
//! [`TimerSet`] so one teardown call stops them all. A task left running
//! after its owner is gone would keep mutating shared state, which is the
//! leak this exists to prevent.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use tokio::task::AbortHandle;

/// Set of abortable background tasks with a single-call teardown
#[derive(Debug, Default)]
pub struct TimerSet {
    handles: Mutex<Vec<AbortHandle>>,
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a task and track its handle
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future).abort_handle();
        let mut handles = self
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Abort every tracked task
    pub fn abort_all(&self) {
        let mut handles = self
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for handle in handles.drain(..) {
            handle.abort();
        }
    }

    /// Number of tracked, not-yet-finished tasks
    pub fn active_count(&self) -> usize {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }
}

impl Drop for TimerSet {
    fn drop(&mut self) {
        self.abort_all();
    }
}
