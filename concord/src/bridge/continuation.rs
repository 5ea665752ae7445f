use crate::error::{BoxError, ContractViolation, Error, Result};
use crate::runtime::task;
use crate::utils::lock;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

struct Shared<T> {
    slot: Mutex<Slot<T>>,

    /// Set by the first resume; every later one is a violation.
    resumed: AtomicBool,

    /// Live [`Resume`] clones.
    resumers: AtomicUsize,
}

struct Slot<T> {
    outcome: Option<Result<T>>,

    waker: Option<Waker>,

    /// The awaiting side is gone (it returned or was dropped).
    abandoned: bool,
}

/// Creates a suspension point completed by a callback.
///
/// `operation` runs immediately, on the calling thread, and receives the
/// [`Resume`] half. Whoever holds it must resume exactly once, from any
/// thread; the returned [`Continuation`] resolves to that outcome.
///
/// Awaiting the continuation is a cancellation checkpoint: if the awaiting
/// task is cancelled it returns [`Error::Cancelled`] and the value resumed
/// later is discarded.
///
/// If every `Resume` is dropped without resuming, an error is logged and the
/// caller stays suspended; wrap the await in
/// [`time::timeout`](crate::time::timeout) when the callback is not trusted.
///
/// # Examples
///
/// ```rust,ignore
/// let body = bridge::continuation(|resume| {
///     client.fetch(url, move |reply| resume.resume_with(reply));
/// })
/// .await?;
/// ```
pub fn continuation<T, F>(operation: F) -> Continuation<T>
where
    F: FnOnce(Resume<T>),
{
    let shared = Arc::new(Shared {
        slot: Mutex::new(Slot {
            outcome: None,
            waker: None,
            abandoned: false,
        }),
        resumed: AtomicBool::new(false),
        resumers: AtomicUsize::new(1),
    });

    operation(Resume {
        shared: shared.clone(),
    });

    Continuation { shared }
}

/// Resuming half of a [`continuation`].
pub struct Resume<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Resume<T> {
    /// Completes the continuation with `outcome`.
    ///
    /// # Panics
    ///
    /// Raises [`ContractViolation::DoubleResume`] if the continuation was
    /// already resumed, through this handle or a clone of it.
    pub fn resume(&self, outcome: Result<T>) {
        if self.shared.resumed.swap(true, Ordering::AcqRel) {
            ContractViolation::DoubleResume.raise();
        }

        let waker = {
            let mut slot = lock(&self.shared.slot);
            if slot.abandoned {
                tracing::debug!("continuation resumed after its caller went away");
                return;
            }

            slot.outcome = Some(outcome);
            slot.waker.take()
        };

        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// Completes the continuation with a value.
    pub fn resume_returning(&self, value: T) {
        self.resume(Ok(value));
    }

    /// Completes the continuation with a collaborator error.
    pub fn resume_throwing<E>(&self, error: E)
    where
        E: Into<BoxError>,
    {
        self.resume(Err(Error::failed(error)));
    }

    /// Completes the continuation from a collaborator's result.
    pub fn resume_with<E>(&self, result: std::result::Result<T, E>)
    where
        E: Into<BoxError>,
    {
        self.resume(result.map_err(Error::failed));
    }
}

impl<T> Clone for Resume<T> {
    fn clone(&self) -> Self {
        self.shared.resumers.fetch_add(1, Ordering::Relaxed);

        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Drop for Resume<T> {
    fn drop(&mut self) {
        if self.shared.resumers.fetch_sub(1, Ordering::AcqRel) == 1
            && !self.shared.resumed.load(Ordering::Acquire)
        {
            tracing::error!("continuation leaked without resuming");
        }
    }
}

impl<T> fmt::Debug for Resume<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resume")
            .field("resumed", &self.shared.resumed.load(Ordering::Relaxed))
            .finish()
    }
}

/// Awaiting half of a [`continuation`].
#[must_use = "a continuation does nothing unless awaited"]
pub struct Continuation<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Future for Continuation<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = lock(&self.shared.slot);

        if let Some(outcome) = slot.outcome.take() {
            slot.abandoned = true;
            return Poll::Ready(outcome);
        }

        if task::is_cancelled() {
            slot.abandoned = true;
            return Poll::Ready(Err(Error::Cancelled));
        }

        match &mut slot.waker {
            Some(waker) => waker.clone_from(cx.waker()),
            None => slot.waker = Some(cx.waker().clone()),
        }

        Poll::Pending
    }
}

impl<T> Drop for Continuation<T> {
    fn drop(&mut self) {
        let mut slot = lock(&self.shared.slot);
        slot.abandoned = true;
        slot.outcome = None;
        slot.waker = None;
    }
}
