use super::{CancelHandle, TaskHandle, TaskId, spawn};
use crate::error::Result;

use std::collections::HashMap;

/// A collection of tasks whose lifetime is bound to an owning scope.
///
/// `TaskSet` tracks tasks by identity so they can be cancelled in bulk,
/// typically when the surface that started them goes away. It does not
/// collect results: keep the [`TaskHandle`] if the output matters.
///
/// Dropping the set cancels every member.
#[derive(Default)]
pub struct TaskSet {
    handles: HashMap<TaskId, CancelHandle>,
}

impl TaskSet {
    /// Creates a new, empty `TaskSet`.
    pub fn new() -> Self {
        Self {
            handles: HashMap::new(),
        }
    }

    /// Spawns a new task and tracks it in the set.
    ///
    /// The returned handle can still be awaited; the set only keeps the
    /// ability to cancel it.
    ///
    /// # Panics
    /// Panics if called outside the context of a running runtime.
    pub fn spawn<F, T>(&mut self, future: F) -> TaskHandle<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let handle = spawn(future);
        self.insert(&handle);
        handle
    }

    /// Starts tracking an already spawned task.
    pub fn insert<T: Send + 'static>(&mut self, handle: &TaskHandle<T>) {
        self.handles.insert(handle.id(), handle.cancel_handle());
    }

    /// Stops tracking a task without cancelling it.
    pub fn remove(&mut self, id: TaskId) -> Option<CancelHandle> {
        self.handles.remove(&id)
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.handles.contains_key(&id)
    }

    /// Returns the number of tracked tasks, finished ones included.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Forgets every task that has already finished.
    pub fn prune(&mut self) {
        self.handles.retain(|_, handle| !handle.is_finished());
    }

    /// Cancels every tracked task and clears the set.
    pub fn cancel_all(&mut self) {
        if !self.handles.is_empty() {
            tracing::debug!(count = self.handles.len(), "cancelling task set");
        }

        for (_, handle) in self.handles.drain() {
            handle.cancel();
        }
    }
}

impl Drop for TaskSet {
    /// Cancels all tracked tasks so none of them outlives the owner.
    fn drop(&mut self) {
        self.cancel_all();
    }
}
