use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Future behind [`yield_now`]: pending once, ready on the next poll.
struct YieldOnce(bool);

impl Future for YieldOnce {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.0 {
            return Poll::Ready(());
        }

        self.0 = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

/// Yields execution back to the executor exactly once.
///
/// Lets other tasks make progress during a long computation. Since the task
/// is re-polled afterwards, this is also a natural place to call
/// [`check_cancellation`](crate::task::check_cancellation).
pub async fn yield_now() {
    YieldOnce(false).await
}
