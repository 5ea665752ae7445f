use crate::runtime::task::{Priority, Runnable};
use crate::utils::lock;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Shared handle to the global task injector.
pub(crate) type InjectorHandle = Arc<Injector>;

/// One FIFO queue per priority level, highest first.
type Lanes = [VecDeque<Arc<dyn Runnable>>; Priority::LEVELS];

/// Global task injector for the work-stealing scheduler.
///
/// Newly spawned and re-woken tasks land here before being picked up by a
/// worker. Tasks are kept in one lane per [`Priority`]; [`steal`](Self::steal)
/// always serves the highest non-empty lane, FIFO within a lane.
///
/// It also coordinates worker parking and waking using a condition
/// variable, allowing workers to sleep when no work is available.
pub(crate) struct Injector {
    lanes: Mutex<Lanes>,

    /// Paired with `condvar` for parking idle workers.
    parked: Mutex<usize>,

    condvar: Condvar,

    /// Indicates whether the executor is shutting down.
    shutdown: AtomicBool,
}

impl Injector {
    pub(crate) fn new() -> Self {
        Injector {
            lanes: Mutex::new(std::array::from_fn(|_| VecDeque::new())),
            parked: Mutex::new(0),
            condvar: Condvar::new(),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Signals shutdown, wakes all parked workers and drops queued tasks.
    pub(crate) fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.condvar.notify_all();

        let dropped: Vec<_> = lock(&self.lanes)
            .iter_mut()
            .flat_map(|lane| lane.drain(..))
            .collect();

        if !dropped.is_empty() {
            tracing::debug!(count = dropped.len(), "dropping tasks queued at shutdown");
        }
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Pushes a task into the lane matching its priority.
    ///
    /// Tasks pushed after shutdown are dropped.
    pub(crate) fn push(&self, task: Arc<dyn Runnable>) {
        if self.is_shutdown() {
            return;
        }

        let lane = task.priority().queue_index();
        lock(&self.lanes)[lane].push_back(task);
        self.condvar.notify_one();
    }

    /// Parks the current worker thread until work becomes available
    /// or a shutdown signal is received.
    ///
    /// The park operation uses a timed wait so a missed notification
    /// costs at most one millisecond.
    pub(crate) fn park(&self) {
        if self.is_shutdown() {
            return;
        }

        if lock(&self.lanes).iter().any(|lane| !lane.is_empty()) {
            return;
        }

        let mut parked = lock(&self.parked);
        *parked += 1;

        let (mut parked, _) = self
            .condvar
            .wait_timeout(parked, Duration::from_millis(1))
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *parked -= 1;
    }

    /// Takes the oldest task of the highest non-empty priority lane.
    pub(crate) fn steal(&self) -> Option<Arc<dyn Runnable>> {
        lock(&self.lanes)
            .iter_mut()
            .find_map(|lane| lane.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe(Priority);

    impl Runnable for Probe {
        fn run(self: Arc<Self>) {}

        fn priority(&self) -> Priority {
            self.0
        }
    }

    #[test]
    fn higher_priority_lanes_are_served_first() {
        let injector = Injector::new();

        injector.push(Arc::new(Probe(Priority::Background)));
        injector.push(Arc::new(Probe(Priority::Medium)));
        injector.push(Arc::new(Probe(Priority::High)));
        injector.push(Arc::new(Probe(Priority::Low)));

        let order: Vec<_> = std::iter::from_fn(|| injector.steal())
            .map(|task| task.priority())
            .collect();

        assert_eq!(
            order,
            vec![
                Priority::High,
                Priority::Medium,
                Priority::Low,
                Priority::Background
            ]
        );
    }

    #[test]
    fn push_after_shutdown_is_dropped() {
        let injector = Injector::new();
        injector.shutdown();
        injector.push(Arc::new(Probe(Priority::High)));

        assert!(injector.steal().is_none());
    }
}
