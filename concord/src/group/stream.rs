use super::TaskGroup;
use super::run::spawn_all;
use crate::error::Result;

use futures_util::Stream;

use std::fmt;
use std::future::{Future, poll_fn};
use std::pin::Pin;
use std::task::{Context, Poll};

/// Runs `body` once per item, all concurrently, and streams each outcome as
/// its child completes.
///
/// Failures are yielded in place and do not stop the siblings. Dropping the
/// stream cancels the children still in flight.
///
/// # Examples
///
/// ```rust,ignore
/// let mut results = group_stream(paths, |path| load(path));
/// while let Some(result) = results.next().await {
///     show(result?);
/// }
/// ```
pub fn group_stream<I, F, Fut, R>(items: I, body: F) -> GroupStream<R>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = Result<R>> + Send + 'static,
    R: Send + 'static,
{
    GroupStream {
        group: spawn_all(items, body),
    }
}

/// Stream returned by [`group_stream`].
#[must_use = "streams do nothing unless polled"]
pub struct GroupStream<R: Send + 'static> {
    group: TaskGroup<R>,
}

impl<R: Send + 'static> GroupStream<R> {
    /// Waits for the next child to finish.
    pub async fn next(&mut self) -> Option<Result<R>> {
        poll_fn(|cx| self.group.poll_next_child(cx)).await
    }

    /// Number of children still in flight.
    pub fn remaining(&self) -> usize {
        self.group.len()
    }

    /// Cancels the children still in flight; the stream keeps yielding their
    /// outcomes.
    pub fn cancel(&self) {
        self.group.cancel_all();
    }
}

impl<R: Send + 'static> Stream for GroupStream<R> {
    type Item = Result<R>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().group.poll_next_child(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.group.len(), Some(self.group.len()))
    }
}

impl<R: Send + 'static> fmt::Debug for GroupStream<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupStream")
            .field("remaining", &self.group.len())
            .finish()
    }
}
