use crate::runtime::task::Runnable;
use crate::utils::lock;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A per-worker local task queue.
///
/// The owning worker pushes and pops at the back (LIFO) for cache locality;
/// other workers steal from the front (FIFO).
pub(crate) struct LocalQueue {
    inner: Mutex<VecDeque<Arc<dyn Runnable>>>,
}

impl LocalQueue {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    pub(crate) fn push(&self, task: Arc<dyn Runnable>) {
        lock(&self.inner).push_back(task);
    }

    /// Pops the most recently pushed task (owner side).
    pub(crate) fn pop(&self) -> Option<Arc<dyn Runnable>> {
        lock(&self.inner).pop_back()
    }

    /// Removes the oldest task (thief side).
    pub(crate) fn steal(&self) -> Option<Arc<dyn Runnable>> {
        lock(&self.inner).pop_front()
    }

    /// Drops every queued task; used once the workers have exited.
    pub(crate) fn clear(&self) {
        let dropped = std::mem::take(&mut *lock(&self.inner));
        drop(dropped);
    }
}
