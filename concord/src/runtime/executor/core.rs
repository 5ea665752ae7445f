use crate::error::Result;
use crate::reactor::ReactorHandle;
use crate::runtime::context::enter_context;
use crate::runtime::executor::worker::Worker;
use crate::runtime::task::{SpawnOptions, TaskHandle};
use crate::runtime::task::core::spawn_on;
use crate::runtime::work_stealing::injector::{Injector, InjectorHandle};
use crate::runtime::work_stealing::queue::LocalQueue;

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

/// Multi-threaded task executor.
///
/// The `Executor` owns the global injector, one local queue per worker and
/// the worker threads themselves. It installs the runtime context on each
/// worker and coordinates orderly shutdown.
pub(crate) struct Executor {
    injector: Arc<Injector>,

    locals: Arc<Vec<Arc<LocalQueue>>>,

    handles: Vec<JoinHandle<()>>,

    /// Shutdown flag shared with all workers.
    shutdown: Arc<AtomicBool>,
}

impl Executor {
    /// Creates a new executor and starts `threads` named worker threads.
    pub(crate) fn new(reactor_handle: ReactorHandle, threads: usize, name: &str) -> io::Result<Self> {
        let injector = Arc::new(Injector::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let locals: Arc<Vec<_>> = Arc::new((0..threads).map(|_| Arc::new(LocalQueue::new())).collect());

        let mut executor = Self {
            injector,
            locals,
            handles: Vec::with_capacity(threads),
            shutdown,
        };

        for id in 0..threads {
            let worker = Worker::new(id, executor.locals.clone(), executor.injector.clone());

            let reactor = reactor_handle.clone();
            let sd = executor.shutdown.clone();
            let injector = executor.injector.clone();

            let spawned = thread::Builder::new()
                .name(format!("{name}-worker-{id}"))
                .spawn(move || {
                    enter_context(reactor.clone(), injector, || {
                        worker.run(sd, reactor);
                    });
                });

            match spawned {
                Ok(handle) => executor.handles.push(handle),
                Err(error) => {
                    executor.shutdown();
                    executor.join();
                    return Err(error);
                }
            }
        }

        Ok(executor)
    }

    /// Signals all workers to shut down and wakes the parked ones.
    pub(crate) fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.injector.shutdown();
    }

    /// Spawns a task from outside the worker pool.
    pub(crate) fn spawn<F, T>(&self, future: F, options: SpawnOptions) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        spawn_on(self.injector.clone(), future, options)
    }

    /// Handle to the global injector, for threads outside the pool that
    /// need the runtime context.
    pub(crate) fn injector(&self) -> InjectorHandle {
        self.injector.clone()
    }

    /// Waits for all worker threads to terminate, then drops stranded tasks.
    pub(crate) fn join(&mut self) {
        for h in self.handles.drain(..) {
            let _ = h.join();
        }

        for local in self.locals.iter() {
            local.clear();
        }
    }
}
