use super::TaskGroup;
use crate::error::{Error, Result};
use crate::runtime::task;

use std::future::Future;

/// What a group does when one of its children fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailureMode {
    /// The first failure cancels the other children and becomes the result.
    /// Values collected so far are discarded.
    #[default]
    Throwing,

    /// Failed children are left out; their siblings run to completion.
    Tolerant,
}

/// Runs `body` once per item, all concurrently, and collects the values in
/// completion order.
///
/// In [`FailureMode::Throwing`] the first child error cancels the remaining
/// children, waits for them, and is returned alone. In
/// [`FailureMode::Tolerant`] failed children are skipped; the call only
/// fails, with [`Error::Cancelled`], when the caller itself was cancelled.
///
/// Must be awaited from a runtime task.
///
/// # Examples
///
/// ```rust,ignore
/// let thumbnails = run_group(ids, |id| render_thumbnail(id), FailureMode::Tolerant).await?;
/// ```
pub async fn run_group<I, F, Fut, R>(items: I, body: F, mode: FailureMode) -> Result<Vec<R>>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = Result<R>> + Send + 'static,
    R: Send + 'static,
{
    let mut group = spawn_all(items, body);
    let mut values = Vec::with_capacity(group.len());

    drain(&mut group, mode, |value| values.push(value)).await?;

    Ok(values)
}

/// Like [`run_group`], but each value lands at the index of its item.
///
/// In tolerant mode a failed item leaves `None` at its index.
pub async fn run_group_indexed<I, F, Fut, R>(items: I, mut body: F, mode: FailureMode) -> Result<Vec<Option<R>>>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = Result<R>> + Send + 'static,
    R: Send + 'static,
{
    let mut group = spawn_all(items.into_iter().enumerate(), |(index, item)| {
        let work = body(item);
        async move { work.await.map(|value| (index, value)) }
    });

    let mut slots: Vec<Option<R>> = std::iter::repeat_with(|| None).take(group.len()).collect();

    drain(&mut group, mode, |(index, value)| slots[index] = Some(value)).await?;

    Ok(slots)
}

pub(crate) fn spawn_all<I, F, Fut, R>(items: I, mut body: F) -> TaskGroup<R>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = Result<R>> + Send + 'static,
    R: Send + 'static,
{
    let items = items.into_iter();
    let mut group = TaskGroup::with_capacity(items.size_hint().0);

    for item in items {
        group.spawn(body(item));
    }

    group
}

/// Joins every child of `group`, handing successful values to `accept`.
async fn drain<R, A>(group: &mut TaskGroup<R>, mode: FailureMode, mut accept: A) -> Result<()>
where
    R: Send + 'static,
    A: FnMut(R),
{
    let mut failures = 0usize;

    while let Some(outcome) = group.next().await {
        match (outcome, mode) {
            (Ok(value), _) => accept(value),
            (Err(error), FailureMode::Throwing) => {
                group.cancel_all();
                while group.next().await.is_some() {}

                return Err(error);
            }
            (Err(error), FailureMode::Tolerant) => {
                failures += 1;
                tracing::debug!(%error, "group child failed; skipping it");
            }
        }
    }

    if task::is_cancelled() {
        return Err(Error::Cancelled);
    }

    if failures > 0 {
        tracing::debug!(failures, "group finished with failed children");
    }

    Ok(())
}
