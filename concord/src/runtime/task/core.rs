use super::state::{COMPLETED, IDLE, NOTIFIED, QUEUED, RUNNING};
use super::{Priority, TaskHandle, TaskId, TaskStatus};
use crate::error::{self, Error, Result};
use crate::runtime::context::{self, CURRENT_INJECTOR, CURRENT_LOCALS, CURRENT_WORKER_ID};
use crate::runtime::work_stealing::injector::Injector;
use crate::utils::lock;

use std::cell::UnsafeCell;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Wake, Waker};

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

/// A runnable unit of work that can be executed by the scheduler.
///
/// The `Runnable` trait abstracts the specific return type of a task,
/// allowing the executor to manage a heterogeneous collection of tasks
/// through `Arc<dyn Runnable>`.
pub(crate) trait Runnable: Send + Sync {
    /// Executes one scheduling slice of the task.
    fn run(self: Arc<Self>);

    /// Scheduling hint used by the injector.
    fn priority(&self) -> Priority;
}

/// Type-erased control surface of a task.
///
/// Used by cancel handles, task sets and the thread-local "current task"
/// slot, none of which care about the output type.
pub(crate) trait TaskControl: Send + Sync {
    fn id(&self) -> TaskId;

    fn priority(&self) -> Priority;

    fn status(&self) -> TaskStatus;

    fn is_cancelled(&self) -> bool;

    /// Whether the task was spawned as a child of a task group.
    fn in_group(&self) -> bool;

    fn cancel(self: Arc<Self>);
}

/// Options fixed at spawn time.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SpawnOptions {
    pub(crate) priority: Priority,
    pub(crate) in_group: bool,
}

impl SpawnOptions {
    /// Options for a task spawned from the current context.
    ///
    /// Priority is inherited from the enclosing task when there is one.
    pub(crate) fn inherited() -> Self {
        let priority = context::current_task()
            .map(|task| task.priority())
            .unwrap_or_default();

        Self {
            priority,
            in_group: false,
        }
    }
}

/// A spawned asynchronous task managed by the runtime.
///
/// A `Task` acts as the container for a `Future`. It coordinates the lifecycle
/// of that future, including its execution state, cancellation flag,
/// waker registration and result storage.
pub(crate) struct Task<T> {
    id: TaskId,

    options: SpawnOptions,

    /// The underlying future, dropped as soon as the task finishes.
    ///
    /// Only touched while the task is `RUNNING`, which the state machine
    /// grants to a single worker at a time.
    future: UnsafeCell<Option<BoxFuture<T>>>,

    /// Outcome, stored before the task moves to `COMPLETED`.
    result: Mutex<Option<Result<T>>>,

    /// Scheduling state (IDLE, QUEUED, RUNNING, ...).
    pub(crate) state: AtomicUsize,

    /// Caller-facing [`TaskStatus`].
    status: AtomicU8,

    /// Cooperative cancellation flag.
    cancelled: AtomicBool,

    /// Reference to the global injector queue for rescheduling.
    injector: Arc<Injector>,

    /// Wakers of the handles awaiting this task.
    waiters: Mutex<Vec<Waker>>,
}

// Safety: the `UnsafeCell` is only accessed by the worker that moved the
// task to `RUNNING`; every other field is synchronized.
unsafe impl<T: Send> Send for Task<T> {}
unsafe impl<T: Send> Sync for Task<T> {}

impl<T: Send + 'static> Task<T> {
    pub(crate) fn new<F>(future: F, injector: Arc<Injector>, options: SpawnOptions) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            id: TaskId::next(),
            options,
            future: UnsafeCell::new(Some(Box::pin(future))),
            result: Mutex::new(None),
            state: AtomicUsize::new(QUEUED),
            status: AtomicU8::new(TaskStatus::Pending.as_u8()),
            cancelled: AtomicBool::new(false),
            injector,
            waiters: Mutex::new(Vec::new()),
        }
    }

    /// Performs one execution slice of the task.
    ///
    /// Moves the task to `RUNNING`, polls the inner future with the task
    /// installed as the current task, then:
    /// - `Poll::Pending`: back to `IDLE`, or re-queued if woken meanwhile.
    /// - `Poll::Ready`: stores the outcome and notifies all handles.
    ///
    /// A task cancelled before its first poll finishes as `Cancelled` without
    /// ever running. A panic in the future is caught and fails the task.
    fn execute(self: Arc<Self>) {
        let current = self.state.load(Ordering::Acquire);

        if current != QUEUED && current != NOTIFIED {
            return;
        }

        if self
            .state
            .compare_exchange(current, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        if self.status() == TaskStatus::Pending {
            if self.cancelled.load(Ordering::Acquire) {
                self.finish(Err(Error::Cancelled));
                return;
            }

            self.set_status(TaskStatus::Running);
        }

        let waker = Waker::from(self.clone());
        let mut cx = Context::from_waker(&waker);

        let poll = context::enter_task(self.clone(), || {
            // Safety: the RUNNING state guarantees that no other thread is polling this future.
            let slot = unsafe { &mut *self.future.get() };

            match slot.as_mut() {
                Some(future) => panic::catch_unwind(AssertUnwindSafe(|| future.as_mut().poll(&mut cx))),
                None => Ok(Poll::Ready(Err(Error::Cancelled))),
            }
        });

        match poll {
            Ok(Poll::Pending) => {
                // Return to IDLE state unless a wake-up occurred during execution (NOTIFIED).
                if self
                    .state
                    .compare_exchange(RUNNING, IDLE, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
                {
                    self.state.store(QUEUED, Ordering::Release);
                    self.injector.push(self.clone());
                }
            }
            Ok(Poll::Ready(outcome)) => self.finish(outcome),
            Err(payload) => self.finish(Err(error::from_panic(payload))),
        }
    }

    /// Records the outcome and wakes every handle awaiting the task.
    ///
    /// Must only be called by the worker holding the task in `RUNNING`.
    fn finish(&self, outcome: Result<T>) {
        // Safety: the caller holds the task in RUNNING.
        unsafe {
            *self.future.get() = None;
        }

        let outcome = match outcome {
            Ok(_) if self.cancelled.load(Ordering::Acquire) => {
                tracing::debug!(task = %self.id, "task finished after cancellation; discarding value");
                Err(Error::Cancelled)
            }
            other => other,
        };

        let status = match &outcome {
            Ok(_) => TaskStatus::Completed,
            Err(Error::Cancelled) => TaskStatus::Cancelled,
            Err(error) => {
                tracing::warn!(task = %self.id, %error, "task failed");
                TaskStatus::Failed
            }
        };

        *lock(&self.result) = Some(outcome);
        self.set_status(status);
        self.state.store(COMPLETED, Ordering::Release);

        let waiters = std::mem::take(&mut *lock(&self.waiters));
        for waker in waiters {
            waker.wake();
        }
    }

    /// Signals the task to be rescheduled.
    ///
    /// If the task is `IDLE`, it moves to `QUEUED` and is pushed to the scheduler.
    /// If the task is `RUNNING`, it moves to `NOTIFIED` to ensure it is re-polled
    /// immediately after its current execution slice.
    fn schedule(self: Arc<Self>) {
        loop {
            match self.state.load(Ordering::Acquire) {
                IDLE => {
                    if self
                        .state
                        .compare_exchange(IDLE, QUEUED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        self.injector.push(self.clone());
                        return;
                    }
                }
                RUNNING => {
                    if self
                        .state
                        .compare_exchange(RUNNING, NOTIFIED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        return;
                    }
                }
                // Already queued, notified or finished: nothing to do.
                _ => return,
            }
        }
    }

    fn set_status(&self, status: TaskStatus) {
        self.status.store(status.as_u8(), Ordering::Release);
    }

    /// Takes the stored outcome if the task has completed.
    ///
    /// Registers `waker` otherwise. The waker is registered before the
    /// state is re-checked so a concurrent completion is never missed.
    pub(crate) fn poll_outcome(&self, waker: &Waker) -> Poll<Result<T>> {
        if let Some(outcome) = self.take_outcome() {
            return Poll::Ready(outcome);
        }

        {
            let mut waiters = lock(&self.waiters);
            if !waiters.iter().any(|known| known.will_wake(waker)) {
                waiters.push(waker.clone());
            }
        }

        match self.take_outcome() {
            Some(outcome) => Poll::Ready(outcome),
            None => Poll::Pending,
        }
    }

    fn take_outcome(&self) -> Option<Result<T>> {
        if self.state.load(Ordering::Acquire) != COMPLETED {
            return None;
        }

        let outcome = lock(&self.result).take();
        assert!(outcome.is_some(), "task handle polled after completion");
        outcome
    }
}

impl<T: Send + 'static> Wake for Task<T> {
    fn wake(self: Arc<Self>) {
        self.schedule();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.clone().schedule();
    }
}

impl<T: Send + 'static> Runnable for Task<T> {
    fn run(self: Arc<Self>) {
        Task::execute(self)
    }

    fn priority(&self) -> Priority {
        self.options.priority
    }
}

impl<T: Send + 'static> TaskControl for Task<T> {
    fn id(&self) -> TaskId {
        self.id
    }

    fn priority(&self) -> Priority {
        self.options.priority
    }

    fn status(&self) -> TaskStatus {
        TaskStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn in_group(&self) -> bool {
        self.options.in_group
    }

    /// Requests cooperative cancellation.
    ///
    /// The task is woken so it reaches its next checkpoint even if it is
    /// currently suspended on something that will never fire.
    fn cancel(self: Arc<Self>) {
        // The outcome is settled once the status is terminal.
        if self.status().is_terminal() {
            return;
        }

        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }

        tracing::debug!(task = %self.id, "cancellation requested");
        self.schedule();
    }
}

/// Creates a task and hands it to the scheduler.
///
/// From a worker thread, default-priority tasks go to the worker's local
/// queue for cache locality. Everything else goes through the global
/// injector, which serves higher priorities first.
pub(crate) fn spawn_on<F, T>(injector: Arc<Injector>, future: F, options: SpawnOptions) -> TaskHandle<T>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    let task = Arc::new(Task::new(future, injector.clone(), options));

    tracing::trace!(task = %task.id, priority = ?options.priority, "spawning task");

    let pushed_locally = options.priority == Priority::Medium
        && CURRENT_WORKER_ID.with(|id_cell| {
            let Some(id) = *id_cell.borrow() else {
                return false;
            };

            CURRENT_LOCALS.with(|locals_cell| match locals_cell.borrow().as_ref() {
                Some(locals) => {
                    locals[id].push(task.clone());
                    true
                }
                None => false,
            })
        });

    if !pushed_locally {
        injector.push(task.clone());
    }

    TaskHandle::new(task)
}

/// Spawns a task onto the runtime driving the current thread.
pub(crate) fn spawn_in_context<F, T>(future: F, options: SpawnOptions) -> TaskHandle<T>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    let injector = CURRENT_INJECTOR.with(|cell| {
        cell.borrow()
            .as_ref()
            .expect("spawn must be called within the context of a runtime")
            .clone()
    });

    spawn_on(injector, future, options)
}

/// Spawns a future as a task onto the current runtime.
///
/// The future reports failure through its `Result`; returning
/// `Err(Error::Cancelled)` (typically via [`check_cancellation`]) marks the
/// task as cancelled. The priority is inherited from the spawning task.
///
/// # Panics
/// Panics if called outside the context of a running runtime.
///
/// [`check_cancellation`]: crate::task::check_cancellation
pub fn spawn<F, T>(future: F) -> TaskHandle<T>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    spawn_in_context(future, SpawnOptions::inherited())
}

/// Spawns a future with an explicit scheduling hint.
///
/// # Panics
/// Panics if called outside the context of a running runtime.
pub fn spawn_with_priority<F, T>(priority: Priority, future: F) -> TaskHandle<T>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    spawn_in_context(
        future,
        SpawnOptions {
            priority,
            in_group: false,
        },
    )
}
