use super::coordinator::{Coordinator, CoordinatorThread};
use super::executor::core::Executor;
use super::task::{Priority, SpawnOptions, TaskHandle};
use crate::error::{Error, Result};
use crate::reactor::Reactor;
use crate::reactor::ReactorHandle;
use crate::reactor::command::Command;

use std::future::Future;
use std::io;
use std::pin::pin;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};
use std::thread::{self, JoinHandle, Thread};

/// The main runtime handle.
///
/// `Runtime` owns:
/// - the executor and its worker threads,
/// - the reactor thread driving timers,
/// - the coordinator thread (unless disabled), the explicit hand-off target
///   for work that must be serialized in one place.
///
/// There is no ambient global runtime: build one with
/// [`RuntimeBuilder`](crate::RuntimeBuilder) and pass handles to whoever
/// needs them. Dropping the runtime shuts everything down in order.
pub struct Runtime {
    executor: Executor,

    reactor_handle: ReactorHandle,

    reactor_thread: Option<JoinHandle<()>>,

    coordinator: Option<CoordinatorThread>,

    worker_threads: usize,
}

impl Runtime {
    pub(crate) fn new(worker_threads: usize, name: &str, with_coordinator: bool) -> io::Result<Self> {
        let (reactor_handle, reactor_thread) = Reactor::start(name)?;

        let executor = match Executor::new(reactor_handle.clone(), worker_threads, name) {
            Ok(executor) => executor,
            Err(error) => {
                let _ = reactor_handle.send(Command::Shutdown);
                let _ = reactor_thread.join();
                return Err(error);
            }
        };

        let mut runtime = Self {
            executor,
            reactor_handle,
            reactor_thread: Some(reactor_thread),
            coordinator: None,
            worker_threads,
        };

        if with_coordinator {
            let reactor = runtime.reactor_handle.clone();
            let injector = runtime.executor.injector();
            runtime.coordinator = Some(CoordinatorThread::start(name, reactor, injector)?);
        }

        tracing::debug!(worker_threads, coordinator = with_coordinator, "runtime started");

        Ok(runtime)
    }

    /// Spawns a future onto the runtime from outside the worker pool.
    ///
    /// The task starts with [`Priority::Medium`].
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let handle = runtime.spawn(async { Ok(21 * 2) });
    /// ```
    pub fn spawn<F, T>(&self, future: F) -> TaskHandle<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        self.spawn_with_priority(Priority::Medium, future)
    }

    /// Spawns a future with an explicit scheduling hint.
    pub fn spawn_with_priority<F, T>(&self, priority: Priority, future: F) -> TaskHandle<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        self.executor.spawn(
            future,
            SpawnOptions {
                priority,
                in_group: false,
            },
        )
    }

    /// Runs a future to completion, blocking the current thread.
    ///
    /// The future runs as a regular task on the worker pool, so every
    /// checkpoint and primitive is available inside it. If the task panics,
    /// the panic is re-raised on the calling thread.
    ///
    /// # Panics
    ///
    /// Panics if the future panics, or if it is called from a worker thread
    /// of a runtime (that would block the worker).
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let result = runtime.block_on(async { 42 });
    /// assert_eq!(result, 42);
    /// ```
    pub fn block_on<F>(&self, future: F) -> F::Output
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        assert!(
            super::context::current_task().is_none(),
            "block_on called from inside a runtime task"
        );

        let handle = self.spawn(async move { Ok(future.await) });

        match park_on(handle) {
            Ok(value) => value,
            Err(Error::ContractViolation(violation)) => std::panic::panic_any(violation),
            Err(Error::Panicked(message)) => panic!("{message}"),
            Err(error) => panic!("block_on task did not complete: {error}"),
        }
    }

    /// Returns a handle to the coordinator thread, if it is enabled.
    pub fn coordinator(&self) -> Option<Coordinator> {
        self.coordinator.as_ref().map(CoordinatorThread::handle)
    }

    /// Number of worker threads driving tasks.
    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }
}

impl Drop for Runtime {
    /// Shuts down the runtime.
    ///
    /// 1. Stops the workers and drops tasks that never got to run
    /// 2. Stops the reactor
    /// 3. Drains and stops the coordinator
    fn drop(&mut self) {
        self.executor.shutdown();
        self.executor.join();

        let _ = self.reactor_handle.send(Command::Shutdown);
        if let Some(thread) = self.reactor_thread.take() {
            let _ = thread.join();
        }

        if let Some(coordinator) = self.coordinator.as_mut() {
            coordinator.shutdown();
        }

        tracing::debug!("runtime stopped");
    }
}

/// Wakes a parked OS thread.
struct ThreadWaker(Thread);

impl Wake for ThreadWaker {
    fn wake(self: Arc<Self>) {
        self.0.unpark();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.0.unpark();
    }
}

/// Drives `future` on the current OS thread by parking between polls.
fn park_on<F: Future>(future: F) -> F::Output {
    let waker = Waker::from(Arc::new(ThreadWaker(thread::current())));
    let mut cx = Context::from_waker(&waker);
    let mut future = pin!(future);

    loop {
        if let Poll::Ready(output) = future.as_mut().poll(&mut cx) {
            return output;
        }

        thread::park();
    }
}
