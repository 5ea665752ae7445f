use crate::reactor::ReactorHandle;
use crate::runtime::context::{CURRENT_LOCALS, CURRENT_WORKER_ID, enter_context};
use crate::runtime::task::Runnable;
use crate::runtime::work_stealing::injector::InjectorHandle;
use crate::runtime::work_stealing::queue::LocalQueue;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A worker thread in the executor.
///
/// The lookup order for the next task is:
/// 1. the worker's own local queue,
/// 2. the global injector (highest priority lane first),
/// 3. another worker's local queue,
/// 4. otherwise park until work arrives.
pub(crate) struct Worker {
    id: usize,

    /// All local queues (one per worker), indexed by worker id.
    locals: Arc<Vec<Arc<LocalQueue>>>,

    injector: InjectorHandle,
}

impl Worker {
    pub(crate) fn new(id: usize, locals: Arc<Vec<Arc<LocalQueue>>>, injector: InjectorHandle) -> Self {
        Self {
            id,
            locals,
            injector,
        }
    }

    /// Runs the worker loop until the shutdown flag is raised.
    pub(crate) fn run(&self, shutdown: Arc<AtomicBool>, reactor: ReactorHandle) {
        CURRENT_WORKER_ID.with(|id| *id.borrow_mut() = Some(self.id));
        CURRENT_LOCALS.with(|locals| *locals.borrow_mut() = Some(self.locals.clone()));

        tracing::trace!(worker = self.id, "worker started");

        while !shutdown.load(Ordering::Acquire) {
            let next = self.locals[self.id]
                .pop()
                .or_else(|| self.injector.steal())
                .or_else(|| self.try_steal());

            match next {
                Some(task) => enter_context(reactor.clone(), self.injector.clone(), || task.run()),
                None => self.injector.park(),
            }
        }

        CURRENT_LOCALS.with(|locals| locals.borrow_mut().take());
        tracing::trace!(worker = self.id, "worker stopped");
    }

    /// Attempts to steal a task from another worker's local queue.
    ///
    /// Victims are visited round-robin starting after this worker.
    fn try_steal(&self) -> Option<Arc<dyn Runnable>> {
        let len = self.locals.len();

        if len <= 1 {
            return None;
        }

        (1..len)
            .map(|offset| (self.id + offset) % len)
            .find_map(|victim| self.locals[victim].steal())
    }
}
