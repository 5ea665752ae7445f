use crate::error::Result;
use crate::runtime::task::core::spawn_in_context;
use crate::runtime::task::{self, Priority, SpawnOptions, TaskHandle, current};

use std::fmt;
use std::future::{Future, poll_fn};
use std::pin::Pin;
use std::task::{Context, Poll};

/// A scoped set of child tasks producing values of the same type.
///
/// Children start as soon as they are spawned. [`next`](Self::next) yields
/// their outcomes in completion order, never in spawn order.
///
/// `next` is a cancellation checkpoint for the caller: once the calling task
/// is cancelled, every child is cancelled too, and the group keeps draining
/// so that no child outlives it. Dropping the group cancels whatever is still
/// running.
///
/// Groups are meant to be used from a task, not from a group child. Creating
/// a group inside a child is logged as a warning.
///
/// # Examples
///
/// ```rust,ignore
/// let mut group = TaskGroup::new();
/// for url in urls {
///     group.spawn(fetch(url));
/// }
///
/// while let Some(page) = group.next().await {
///     render(page?);
/// }
/// ```
pub struct TaskGroup<R: Send + 'static> {
    /// Children not joined yet.
    handles: Vec<TaskHandle<R>>,

    /// The caller's cancellation has already been forwarded to the children.
    forwarded: bool,
}

impl<R: Send + 'static> TaskGroup<R> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates a group sized for `capacity` children.
    pub fn with_capacity(capacity: usize) -> Self {
        if current::in_group() {
            tracing::warn!(
                task = ?task::current_id(),
                "task group created inside a group child; nested groups are not supported"
            );
        }

        Self {
            handles: Vec::with_capacity(capacity),
            forwarded: false,
        }
    }

    /// Spawns a child with the caller's priority.
    pub fn spawn<F>(&mut self, work: F)
    where
        F: Future<Output = Result<R>> + Send + 'static,
    {
        self.spawn_with_priority(SpawnOptions::inherited().priority, work);
    }

    /// Spawns a child with an explicit scheduling hint.
    pub fn spawn_with_priority<F>(&mut self, priority: Priority, work: F)
    where
        F: Future<Output = Result<R>> + Send + 'static,
    {
        let handle = spawn_in_context(
            work,
            SpawnOptions {
                priority,
                in_group: true,
            },
        );

        self.handles.push(handle);
    }

    /// Number of children not joined yet.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Requests cancellation of every child.
    ///
    /// Children stay in the group: keep calling [`next`](Self::next) to
    /// collect their (mostly `Cancelled`) outcomes.
    pub fn cancel_all(&self) {
        for handle in &self.handles {
            handle.cancel();
        }
    }

    /// Waits for the next child to finish.
    ///
    /// Returns `None` once every child has been joined.
    pub async fn next(&mut self) -> Option<Result<R>> {
        poll_fn(|cx| self.poll_next_child(cx)).await
    }

    pub(crate) fn poll_next_child(&mut self, cx: &mut Context<'_>) -> Poll<Option<Result<R>>> {
        if self.handles.is_empty() {
            return Poll::Ready(None);
        }

        if !self.forwarded && task::is_cancelled() {
            self.forwarded = true;
            tracing::debug!(children = self.handles.len(), "group owner cancelled; cancelling children");
            self.cancel_all();
        }

        let mut i = 0;

        while i < self.handles.len() {
            match Pin::new(&mut self.handles[i]).poll(cx) {
                Poll::Ready(outcome) => {
                    // Completion order is all that matters; swapping keeps removal O(1).
                    self.handles.swap_remove(i);
                    return Poll::Ready(Some(outcome));
                }
                Poll::Pending => {
                    i += 1;
                }
            }
        }

        Poll::Pending
    }
}

impl<R: Send + 'static> Default for TaskGroup<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Send + 'static> Drop for TaskGroup<R> {
    /// Cancels the children that were never joined.
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.cancel();
        }
    }
}

impl<R: Send + 'static> fmt::Debug for TaskGroup<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskGroup")
            .field("pending", &self.handles.len())
            .finish()
    }
}
