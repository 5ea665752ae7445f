use crate::reactor::ReactorHandle;
use crate::runtime::task::TaskControl;
use crate::runtime::work_stealing::injector::InjectorHandle;
use crate::runtime::work_stealing::queue::LocalQueue;

use std::cell::{Cell, RefCell};
use std::sync::Arc;

thread_local! {
    /// Thread-local handle to the current reactor.
    ///
    /// This is set when entering the runtime context and allows
    /// timers to reach the reactor without explicit parameter passing.
    pub(crate) static CURRENT_REACTOR: RefCell<Option<ReactorHandle>> =
        const { RefCell::new(None) };

    /// Thread-local handle to the global injector queue.
    pub(crate) static CURRENT_INJECTOR: RefCell<Option<InjectorHandle>> =
        const { RefCell::new(None) };

    /// Thread-local identifier of the current worker thread.
    pub(crate) static CURRENT_WORKER_ID: RefCell<Option<usize>> =
        const { RefCell::new(None) };

    /// Thread-local references to all local worker queues.
    pub(crate) static CURRENT_LOCALS: RefCell<Option<Arc<Vec<Arc<LocalQueue>>>>> =
        const { RefCell::new(None) };

    /// The task being polled on this thread.
    ///
    /// Cancellation checkpoints read their flag from here.
    static CURRENT_TASK: RefCell<Option<Arc<dyn TaskControl>>> =
        const { RefCell::new(None) };

    /// Set on the coordinator thread only.
    pub(crate) static ON_COORDINATOR: Cell<bool> = const { Cell::new(false) };
}

/// Enters the runtime execution context for the current thread.
///
/// This function temporarily installs thread-local runtime state
/// (reactor and injector handles) for the duration of the closure `f`.
/// After the closure completes, the previous context is restored.
pub(crate) fn enter_context<R>(
    reactor: ReactorHandle,
    injector: InjectorHandle,
    f: impl FnOnce() -> R,
) -> R {
    CURRENT_REACTOR.with(|r| {
        CURRENT_INJECTOR.with(|i| {
            let prev_r = r.replace(Some(reactor));
            let prev_i = i.replace(Some(injector));

            let out = f();

            i.replace(prev_i);
            r.replace(prev_r);

            out
        })
    })
}

/// Runs `f` with `task` installed as the current task.
///
/// `f` must not unwind; the executor catches panics inside it.
pub(crate) fn enter_task<R>(task: Arc<dyn TaskControl>, f: impl FnOnce() -> R) -> R {
    let prev = CURRENT_TASK.with(|cell| cell.replace(Some(task)));
    let out = f();
    CURRENT_TASK.with(|cell| cell.replace(prev));
    out
}

/// Returns the task being polled on this thread, if any.
pub(crate) fn current_task() -> Option<Arc<dyn TaskControl>> {
    CURRENT_TASK.with(|cell| cell.borrow().clone())
}
