use crate::error::{BoxError, Error, Result};
use crate::runtime::task;
use crate::utils::lock;

use futures_util::Stream;

use std::collections::VecDeque;
use std::fmt;
use std::future::poll_fn;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

type TerminationHook = Box<dyn FnOnce(Termination) + Send>;

/// How a bridged stream buffers values its consumer has not read yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BufferPolicy {
    /// Keep everything.
    #[default]
    Unbounded,

    /// Keep at most `n` values; new values are dropped while full.
    Oldest(usize),

    /// Keep at most `n` values; the oldest buffered value makes room.
    Newest(usize),
}

/// Outcome of [`Yielder::yield_value`].
#[derive(Debug, PartialEq, Eq)]
pub enum YieldResult<T> {
    /// Buffered. `remaining` is the free capacity left (`usize::MAX` when
    /// unbounded).
    Enqueued { remaining: usize },

    /// Buffered at the cost of this value: the rejected one for
    /// [`BufferPolicy::Oldest`], the evicted one for [`BufferPolicy::Newest`].
    Dropped(T),

    /// The stream no longer accepts values.
    Terminated,
}

/// Why a bridged stream stopped accepting values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The producer finished it, normally or with an error.
    Finished,

    /// The consumer went away.
    Cancelled,
}

struct Channel<T> {
    buffer: VecDeque<T>,

    policy: BufferPolicy,

    /// Set once; no yield is accepted afterwards.
    terminated: Option<Termination>,

    /// Error delivered to the consumer once the buffer is drained.
    failure: Option<Error>,

    /// The consumer has seen the end.
    exhausted: bool,

    consumer: Option<Waker>,

    hook: Option<TerminationHook>,
}

impl<T> Channel<T> {
    fn push(&mut self, value: T) -> YieldResult<T> {
        match self.policy {
            BufferPolicy::Unbounded => {
                self.buffer.push_back(value);
                YieldResult::Enqueued { remaining: usize::MAX }
            }
            BufferPolicy::Oldest(limit) if self.buffer.len() >= limit => YieldResult::Dropped(value),
            BufferPolicy::Newest(limit) if self.buffer.len() >= limit => match self.buffer.pop_front() {
                Some(evicted) => {
                    self.buffer.push_back(value);
                    YieldResult::Dropped(evicted)
                }
                // Zero capacity.
                None => YieldResult::Dropped(value),
            },
            BufferPolicy::Oldest(limit) | BufferPolicy::Newest(limit) => {
                self.buffer.push_back(value);
                YieldResult::Enqueued {
                    remaining: limit - self.buffer.len(),
                }
            }
        }
    }

    /// Marks the channel terminated and hands back the hook, which must
    /// run outside the lock. No-op if already terminated.
    fn terminate(&mut self, reason: Termination, failure: Option<Error>) -> Option<TerminationHook> {
        if self.terminated.is_some() {
            return None;
        }

        self.terminated = Some(reason);
        self.failure = failure;
        self.hook.take()
    }
}

struct Shared<T> {
    channel: Mutex<Channel<T>>,

    /// Live [`Yielder`] clones.
    producers: AtomicUsize,
}

impl<T> Shared<T> {
    /// Terminates the channel, wakes the consumer and runs the hook.
    fn terminate(&self, reason: Termination, failure: Option<Error>) {
        let (hook, waker) = {
            let mut channel = lock(&self.channel);
            (channel.terminate(reason, failure), channel.consumer.take())
        };

        if let Some(waker) = waker {
            waker.wake();
        }

        if let Some(hook) = hook {
            hook(reason);
        }
    }
}

/// Creates a stream fed by a callback-style producer.
///
/// `producer` runs immediately, on the calling thread, and receives the
/// [`Yielder`] half. Values are delivered in the order they were yielded.
/// Uses [`BufferPolicy::Unbounded`].
///
/// The producer is never stopped by the stream: when the consumer goes away
/// the stream only stops accepting values and fires the hook registered with
/// [`Yielder::on_termination`], if any. Tearing the producer down is the
/// hook's job.
///
/// # Examples
///
/// ```rust,ignore
/// let mut events = bridge::stream(|yielder| {
///     let registration = bus.subscribe(move |event| {
///         yielder.yield_value(event);
///     });
/// });
///
/// while let Some(event) = events.next().await {
///     handle(event?);
/// }
/// ```
pub fn stream<T, F>(producer: F) -> BridgedStream<T>
where
    F: FnOnce(Yielder<T>),
{
    stream_with_policy(BufferPolicy::Unbounded, producer)
}

/// Like [`stream`], with an explicit buffering policy.
pub fn stream_with_policy<T, F>(policy: BufferPolicy, producer: F) -> BridgedStream<T>
where
    F: FnOnce(Yielder<T>),
{
    let shared = Arc::new(Shared {
        channel: Mutex::new(Channel {
            buffer: VecDeque::new(),
            policy,
            terminated: None,
            failure: None,
            exhausted: false,
            consumer: None,
            hook: None,
        }),
        producers: AtomicUsize::new(1),
    });

    producer(Yielder {
        shared: shared.clone(),
    });

    BridgedStream { shared }
}

/// Producing half of a bridged [`stream`].
///
/// Cheap to clone and usable from any thread. The stream finishes normally
/// when the last clone is dropped.
pub struct Yielder<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Yielder<T> {
    /// Offers a value to the consumer.
    pub fn yield_value(&self, value: T) -> YieldResult<T> {
        let (outcome, waker) = {
            let mut channel = lock(&self.shared.channel);
            if channel.terminated.is_some() {
                return YieldResult::Terminated;
            }

            (channel.push(value), channel.consumer.take())
        };

        if let Some(waker) = waker {
            waker.wake();
        }

        outcome
    }

    /// Yields the value of `result`, or finishes the stream with its error.
    pub fn yield_with<E>(&self, result: std::result::Result<T, E>) -> YieldResult<T>
    where
        E: Into<BoxError>,
    {
        match result {
            Ok(value) => self.yield_value(value),
            Err(error) => {
                self.finish_with(error);
                YieldResult::Terminated
            }
        }
    }

    /// Ends the stream once buffered values are consumed.
    pub fn finish(&self) {
        self.shared.terminate(Termination::Finished, None);
    }

    /// Ends the stream with an error, delivered after buffered values.
    pub fn finish_with<E>(&self, error: E)
    where
        E: Into<BoxError>,
    {
        self.shared
            .terminate(Termination::Finished, Some(Error::failed(error)));
    }

    /// Registers the teardown to run when the stream terminates, from either
    /// side. Runs immediately if it already has. Replaces any previous hook.
    pub fn on_termination<F>(&self, hook: F)
    where
        F: FnOnce(Termination) + Send + 'static,
    {
        let reason = {
            let mut channel = lock(&self.shared.channel);
            match channel.terminated {
                Some(reason) => reason,
                None => {
                    channel.hook = Some(Box::new(hook));
                    return;
                }
            }
        };

        hook(reason);
    }

    /// Returns `true` once the stream stopped accepting values.
    pub fn is_terminated(&self) -> bool {
        lock(&self.shared.channel).terminated.is_some()
    }
}

impl<T> Clone for Yielder<T> {
    fn clone(&self) -> Self {
        self.shared.producers.fetch_add(1, Ordering::Relaxed);

        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Drop for Yielder<T> {
    fn drop(&mut self) {
        if self.shared.producers.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.shared.terminate(Termination::Finished, None);
        }
    }
}

impl<T> fmt::Debug for Yielder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Yielder")
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

/// Consuming half of a bridged [`stream`].
///
/// Yields `Ok(value)` for each value, then ends. If the producer finished
/// with an error, that error is yielded last. Reading is a cancellation
/// checkpoint: a cancelled task gets `Err(Error::Cancelled)` once, and the
/// stream then ends.
///
/// Dropping the stream terminates it.
#[must_use = "streams do nothing unless polled"]
pub struct BridgedStream<T> {
    shared: Arc<Shared<T>>,
}

impl<T> BridgedStream<T> {
    /// Waits for the next value.
    pub async fn next(&mut self) -> Option<Result<T>> {
        poll_fn(|cx| self.poll_read(cx)).await
    }

    fn poll_read(&self, cx: &mut Context<'_>) -> Poll<Option<Result<T>>> {
        let cancelled = {
            let mut channel = lock(&self.shared.channel);

            if channel.exhausted {
                return Poll::Ready(None);
            }

            if task::is_cancelled() {
                channel.exhausted = true;
                channel.buffer.clear();
                true
            } else {
                if let Some(value) = channel.buffer.pop_front() {
                    return Poll::Ready(Some(Ok(value)));
                }

                if channel.terminated.is_some() {
                    channel.exhausted = true;
                    return Poll::Ready(channel.failure.take().map(Err));
                }

                match &mut channel.consumer {
                    Some(waker) => waker.clone_from(cx.waker()),
                    None => channel.consumer = Some(cx.waker().clone()),
                }

                false
            }
        };

        if cancelled {
            tracing::debug!("stream consumer cancelled");
            self.shared.terminate(Termination::Cancelled, None);
            return Poll::Ready(Some(Err(Error::Cancelled)));
        }

        Poll::Pending
    }
}

impl<T> Stream for BridgedStream<T> {
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.poll_read(cx)
    }
}

impl<T> Drop for BridgedStream<T> {
    fn drop(&mut self) {
        lock(&self.shared.channel).buffer.clear();
        self.shared.terminate(Termination::Cancelled, None);
    }
}

impl<T> fmt::Debug for BridgedStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let channel = lock(&self.shared.channel);
        f.debug_struct("BridgedStream")
            .field("buffered", &channel.buffer.len())
            .field("terminated", &channel.terminated)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::pin::pin;
    use std::sync::atomic::AtomicBool;

    fn drain<T>(stream: BridgedStream<T>) -> Vec<Result<T>> {
        let mut stream = pin!(stream);
        let mut cx = Context::from_waker(Waker::noop());
        let mut items = Vec::new();

        while let Poll::Ready(Some(item)) = stream.as_mut().poll_next(&mut cx) {
            items.push(item);
        }

        items
    }

    #[test]
    fn values_then_finish() {
        let stream = stream(|yielder| {
            for value in [1, 2, 3] {
                yielder.yield_value(value);
            }
            yielder.finish();
        });

        let values: Vec<_> = drain(stream).into_iter().map(|item| item.unwrap()).collect();

        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn error_is_delivered_after_buffered_values() {
        let stream = stream(|yielder| {
            yielder.yield_value(1);
            yielder.yield_value(2);
            yielder.finish_with("decoder failed");
            assert_eq!(yielder.yield_value(3), YieldResult::Terminated);
        });

        let items = drain(stream);

        assert_eq!(items.len(), 3);
        assert!(matches!(items[0], Ok(1)));
        assert!(matches!(items[1], Ok(2)));
        assert!(matches!(&items[2], Err(Error::OperationFailed(e)) if e.to_string() == "decoder failed"));
    }

    #[test]
    fn oldest_policy_rejects_new_values() {
        let stream = stream_with_policy(BufferPolicy::Oldest(2), |yielder| {
            assert_eq!(yielder.yield_value('a'), YieldResult::Enqueued { remaining: 1 });
            assert_eq!(yielder.yield_value('b'), YieldResult::Enqueued { remaining: 0 });
            assert_eq!(yielder.yield_value('c'), YieldResult::Dropped('c'));
        });

        let values: Vec<_> = drain(stream).into_iter().map(|item| item.unwrap()).collect();
        assert_eq!(values, vec!['a', 'b']);
    }

    #[test]
    fn newest_policy_evicts_old_values() {
        let stream = stream_with_policy(BufferPolicy::Newest(2), |yielder| {
            yielder.yield_value('a');
            yielder.yield_value('b');
            assert_eq!(yielder.yield_value('c'), YieldResult::Dropped('a'));
        });

        let values: Vec<_> = drain(stream).into_iter().map(|item| item.unwrap()).collect();
        assert_eq!(values, vec!['b', 'c']);
    }

    #[test]
    fn dropping_the_consumer_fires_the_hook_but_keeps_the_producer() {
        let torn_down = Arc::new(AtomicBool::new(false));
        let mut producer = None;

        let stream = stream(|yielder: Yielder<u32>| {
            let flag = torn_down.clone();
            yielder.on_termination(move |reason| {
                assert_eq!(reason, Termination::Cancelled);
                flag.store(true, Ordering::SeqCst);
            });
            producer = Some(yielder);
        });

        drop(stream);

        let yielder = producer.expect("producer ran synchronously");
        assert!(torn_down.load(Ordering::SeqCst));
        assert!(yielder.is_terminated());
        assert_eq!(yielder.yield_value(4), YieldResult::Terminated);
    }

    #[test]
    fn last_yielder_dropped_finishes_the_stream() {
        let stream = stream(|yielder| {
            let copy = yielder.clone();
            yielder.yield_value("only");
            drop(copy);
        });

        let items = drain(stream);
        assert_eq!(items.len(), 1);
    }
}
