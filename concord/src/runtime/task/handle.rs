use super::core::{Task, TaskControl};
use super::{Priority, TaskId, TaskStatus};
use crate::error::Result;

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// A handle to a spawned task.
///
/// A `TaskHandle` is a [`Future`] resolving to the task's outcome:
/// - `Ok(value)` when the work completed,
/// - `Err(Error::Cancelled)` when cancellation was requested before it
///   finished (even if the work itself ran to completion),
/// - any other error the work returned, or `Error::Panicked` /
///   `Error::ContractViolation` if it panicked.
///
/// Dropping the handle does **not** cancel the task; the runtime keeps
/// driving it to completion (fire-and-forget).
///
/// [`Error::Cancelled`]: crate::Error::Cancelled
pub struct TaskHandle<T> {
    /// Shared reference to the underlying task.
    pub(crate) task: Arc<Task<T>>,
}

impl<T: Send + 'static> TaskHandle<T> {
    pub(crate) fn new(task: Arc<Task<T>>) -> Self {
        Self { task }
    }

    /// Identity of the task.
    pub fn id(&self) -> TaskId {
        self.task.id()
    }

    /// Current lifecycle status.
    pub fn status(&self) -> TaskStatus {
        self.task.status()
    }

    /// Scheduling hint the task was spawned with.
    pub fn priority(&self) -> Priority {
        TaskControl::priority(&*self.task)
    }

    /// Returns `true` once the task has completed, failed or been cancelled.
    pub fn is_finished(&self) -> bool {
        self.status().is_terminal()
    }

    /// Returns `true` if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.task.is_cancelled()
    }

    /// Requests cooperative cancellation of the task.
    ///
    /// The task observes the request at its next checkpoint. Cancelling a
    /// finished task has no effect.
    pub fn cancel(&self) {
        self.task.clone().cancel();
    }

    /// Returns a type-erased handle that can only cancel and inspect the task.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            task: self.task.clone(),
        }
    }
}

impl<T: Send + 'static> Future for TaskHandle<T> {
    type Output = Result<T>;

    /// Resolves once the task has finished.
    ///
    /// # Panics
    /// Panics if polled again after returning `Poll::Ready`.
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<T>> {
        self.task.poll_outcome(cx.waker())
    }
}

impl<T: Send + 'static> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id())
            .field("status", &self.status())
            .finish()
    }
}

/// Output-agnostic handle used for cancellation and bookkeeping.
///
/// Obtained from [`TaskHandle::cancel_handle`]; this is what a
/// [`TaskSet`](crate::task::TaskSet) stores.
#[derive(Clone)]
pub struct CancelHandle {
    task: Arc<dyn TaskControl>,
}

impl CancelHandle {
    pub fn id(&self) -> TaskId {
        self.task.id()
    }

    pub fn status(&self) -> TaskStatus {
        self.task.status()
    }

    pub fn is_finished(&self) -> bool {
        self.status().is_terminal()
    }

    /// Requests cooperative cancellation of the task.
    pub fn cancel(&self) {
        self.task.clone().cancel();
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("id", &self.id())
            .field("status", &self.status())
            .finish()
    }
}
