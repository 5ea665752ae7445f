use super::TaskId;
use crate::error::{Error, Result};
use crate::runtime::context;
use crate::time;

use std::future::poll_fn;
use std::pin::pin;
use std::task::Poll;
use std::time::Duration;

/// Returns `true` if the task running on this thread has been asked to stop.
///
/// Always `false` outside of a task.
pub fn is_cancelled() -> bool {
    context::current_task().is_some_and(|task| task.is_cancelled())
}

/// Returns `Err(Error::Cancelled)` if the current task has been cancelled.
///
/// Meant to be used with `?` at safe points (loop boundaries, before or
/// after expensive work) so the task unwinds instead of completing.
pub fn check_cancellation() -> Result<()> {
    if is_cancelled() {
        return Err(Error::Cancelled);
    }

    Ok(())
}

/// Identity of the task running on this thread, if any.
pub fn current_id() -> Option<TaskId> {
    context::current_task().map(|task| task.id())
}

/// Whether the current task is a child of a task group.
pub(crate) fn in_group() -> bool {
    context::current_task().is_some_and(|task| task.in_group())
}

/// Suspends the current task for `duration`, waking early on cancellation.
///
/// Fails with [`Error::Cancelled`] if the task is cancelled before or during
/// the wait. Use [`time::sleep`] for a wait that ignores cancellation.
///
/// # Panics
/// Panics if polled outside of a running runtime.
pub async fn sleep(duration: Duration) -> Result<()> {
    check_cancellation()?;

    let mut timer = pin!(time::sleep(duration));

    poll_fn(|cx| {
        if is_cancelled() {
            return Poll::Ready(Err(Error::Cancelled));
        }

        timer.as_mut().poll(cx).map(Ok)
    })
    .await
}
