use super::IsolatedState;
use crate::bridge::{self, BridgedStream, YieldResult, Yielder};

/// An isolated value that broadcasts every mutation.
///
/// Subscribers receive the current value first, then the value after each
/// [`mutate`](Self::mutate), in order. A subscriber that drops its stream is
/// forgotten on the next broadcast. Dropping the `Published` ends every
/// subscription.
pub struct Published<T> {
    state: IsolatedState<Subject<T>>,
}

struct Subject<T> {
    value: T,
    subscribers: Vec<Yielder<T>>,
}

impl<T: Clone> Subject<T> {
    fn publish(&mut self) {
        let value = &self.value;
        self.subscribers
            .retain(|subscriber| !matches!(subscriber.yield_value(value.clone()), YieldResult::Terminated));
    }
}

impl<T: Clone + Send + 'static> Published<T> {
    pub fn new(value: T) -> Self {
        Self {
            state: IsolatedState::new(Subject {
                value,
                subscribers: Vec::new(),
            }),
        }
    }

    /// Runs `f` with shared access to the value.
    pub async fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.state.read(|subject| f(&subject.value)).await
    }

    /// Snapshot of the current value.
    pub async fn get(&self) -> T {
        self.read(T::clone).await
    }

    /// Runs `f` with exclusive access, then broadcasts the new value.
    pub async fn mutate<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        self.state
            .mutate(|subject| {
                let output = f(&mut subject.value);
                subject.publish();
                output
            })
            .await
    }

    /// Starts a subscription, primed with the current value.
    pub async fn subscribe(&self) -> BridgedStream<T> {
        self.state
            .mutate(|subject| {
                let current = subject.value.clone();

                bridge::stream(|yielder| {
                    yielder.yield_value(current);
                    subject.subscribers.push(yielder);
                })
            })
            .await
    }

    /// Number of live subscriptions, as of the last broadcast.
    pub async fn subscriber_count(&self) -> usize {
        self.state.read(|subject| subject.subscribers.len()).await
    }

    pub fn into_inner(self) -> T {
        self.state.into_inner().value
    }
}
