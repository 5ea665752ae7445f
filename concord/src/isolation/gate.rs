use crate::utils::lock;

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll, Waker};

/// Asynchronous single-holder gate.
///
/// Tasks that cannot pass are suspended, not blocked, and woken in the order
/// they queued up. A task arriving while the gate is free may pass ahead of
/// a queued one that has been woken but not polled yet; mutual exclusion is
/// what matters, not strict fairness.
pub(crate) struct Gate {
    /// Whether a [`Permit`] is currently alive.
    locked: AtomicBool,

    waiters: Mutex<Waiters>,
}

#[derive(Default)]
struct Waiters {
    queue: VecDeque<(u64, Waker)>,
    next_ticket: u64,
}

impl Gate {
    pub(crate) fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
            waiters: Mutex::new(Waiters::default()),
        }
    }

    /// Passes the gate without waiting, if it is free.
    pub(crate) fn try_acquire(&self) -> Option<Permit<'_>> {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| Permit { gate: self })
    }

    /// Returns a future resolving to a [`Permit`] once the gate is free.
    pub(crate) fn acquire(&self) -> Acquire<'_> {
        Acquire {
            gate: self,
            ticket: None,
        }
    }

    /// Wakes the oldest queued waiter, if any.
    fn notify_one(&self) {
        let next = lock(&self.waiters).queue.pop_front();

        if let Some((_, waker)) = next {
            waker.wake();
        }
    }

    fn release(&self) {
        self.locked.store(false, Ordering::Release);
        self.notify_one();
    }
}

/// Future returned by [`Gate::acquire`].
pub(crate) struct Acquire<'a> {
    gate: &'a Gate,

    /// Position in the wait queue, once registered.
    ticket: Option<u64>,
}

impl<'a> Acquire<'a> {
    /// Drops our queue entry; returns `false` if it had already been popped
    /// by a release (meaning we were the one notified).
    fn leave_queue(&mut self) -> bool {
        let Some(ticket) = self.ticket.take() else {
            return true;
        };

        let mut waiters = lock(&self.gate.waiters);
        match waiters.queue.iter().position(|(t, _)| *t == ticket) {
            Some(index) => {
                waiters.queue.remove(index);
                true
            }
            None => false,
        }
    }
}

impl<'a> Future for Acquire<'a> {
    type Output = Permit<'a>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let gate = self.gate;

        if let Some(permit) = gate.try_acquire() {
            self.leave_queue();
            return Poll::Ready(permit);
        }

        let mut waiters = lock(&gate.waiters);

        let queued = self
            .ticket
            .and_then(|ticket| waiters.queue.iter_mut().find(|(other, _)| *other == ticket));

        match queued {
            Some((_, waker)) => waker.clone_from(cx.waker()),
            None => {
                let ticket = waiters.next_ticket;
                waiters.next_ticket += 1;

                // Woken but beaten to the gate: go back to the front.
                if self.ticket.is_some() {
                    waiters.queue.push_front((ticket, cx.waker().clone()));
                } else {
                    waiters.queue.push_back((ticket, cx.waker().clone()));
                }

                self.ticket = Some(ticket);
            }
        }

        drop(waiters);

        // The holder may have released between our first attempt and the
        // registration above; retry so that release is not missed.
        if let Some(permit) = gate.try_acquire() {
            self.leave_queue();
            return Poll::Ready(permit);
        }

        Poll::Pending
    }
}

impl Drop for Acquire<'_> {
    /// Leaves the queue. If this waiter had already been notified, the
    /// notification is passed on so the next waiter is not stranded.
    fn drop(&mut self) {
        if self.ticket.is_some() && !self.leave_queue() {
            self.gate.notify_one();
        }
    }
}

/// Proof of passage through a [`Gate`]; reopens it when dropped.
pub(crate) struct Permit<'a> {
    gate: &'a Gate,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::pin::pin;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::task::Wake;

    struct CountingWaker(AtomicUsize);

    impl Wake for CountingWaker {
        fn wake(self: Arc<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn try_acquire_is_exclusive() {
        let gate = Gate::new();

        let permit = gate.try_acquire();
        assert!(permit.is_some());
        assert!(gate.try_acquire().is_none());

        drop(permit);
        assert!(gate.try_acquire().is_some());
    }

    #[test]
    fn release_wakes_queued_waiter() {
        let gate = Gate::new();
        let counter = Arc::new(CountingWaker(AtomicUsize::new(0)));
        let waker = Waker::from(counter.clone());
        let mut cx = Context::from_waker(&waker);

        let held = gate.try_acquire();
        let mut waiting = pin!(gate.acquire());

        assert!(waiting.as_mut().poll(&mut cx).is_pending());

        drop(held);
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        assert!(waiting.as_mut().poll(&mut cx).is_ready());
    }

    #[test]
    fn dropped_notified_waiter_passes_the_wakeup_on() {
        let gate = Gate::new();
        let first = Arc::new(CountingWaker(AtomicUsize::new(0)));
        let second = Arc::new(CountingWaker(AtomicUsize::new(0)));
        let first_waker = Waker::from(first.clone());
        let second_waker = Waker::from(second.clone());

        let held = gate.try_acquire();

        let mut a = Box::pin(gate.acquire());
        let mut b = Box::pin(gate.acquire());
        assert!(a.as_mut().poll(&mut Context::from_waker(&first_waker)).is_pending());
        assert!(b.as_mut().poll(&mut Context::from_waker(&second_waker)).is_pending());

        drop(held);
        assert_eq!(first.0.load(Ordering::SeqCst), 1);

        drop(a);
        assert_eq!(second.0.load(Ordering::SeqCst), 1);
    }
}
