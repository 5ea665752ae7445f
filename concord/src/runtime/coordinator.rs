use crate::bridge::{Resume, continuation};
use crate::error::{self, Error, Result};
use crate::reactor::ReactorHandle;
use crate::runtime::context::{ON_COORDINATOR, enter_context};
use crate::runtime::work_stealing::injector::InjectorHandle;

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() + Send>;

enum Message {
    Run(Job),
    Shutdown,
}

/// Handle to the runtime's coordinator thread.
///
/// The coordinator is a single dedicated thread that serializes work which
/// must happen in one place, the way a UI thread does. Tasks never run there
/// implicitly: results destined for it are handed off explicitly with
/// [`run`](Self::run) or [`dispatch`](Self::dispatch).
///
/// Handles are cheap to clone and are meant to be passed explicitly to the
/// components that need them.
#[derive(Clone)]
pub struct Coordinator {
    sender: Sender<Message>,
}

impl Coordinator {
    /// Runs `f` on the coordinator thread and returns its value.
    ///
    /// The calling task suspends until `f` has run. Fails with
    /// [`Error::Shutdown`] if the runtime is gone, or with
    /// [`Error::Panicked`] if `f` panicked (the coordinator survives).
    pub async fn run<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let sender = self.sender.clone();

        continuation(move |resume: Resume<R>| {
            let reply = Reply(Some(resume));

            let job: Job = Box::new(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(f)).map_err(error::from_panic);
                reply.send(outcome);
            });

            // A job that never runs drops its reply, which reports `Shutdown`.
            let _ = sender.send(Message::Run(job));
        })
        .await
    }

    /// Queues `f` on the coordinator thread without waiting for it.
    ///
    /// Returns [`Error::Shutdown`] if the runtime is gone.
    pub fn dispatch<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.sender
            .send(Message::Run(Box::new(f)))
            .map_err(|_| Error::Shutdown)
    }

    /// Returns `true` when called from the coordinator thread.
    pub fn is_current() -> bool {
        ON_COORDINATOR.with(|flag| flag.get())
    }
}

/// Answer slot of a [`Coordinator::run`] job.
///
/// Resumes the waiting task with [`Error::Shutdown`] if the job is dropped
/// without having run.
struct Reply<R>(Option<Resume<R>>);

impl<R> Reply<R> {
    fn send(mut self, outcome: Result<R>) {
        if let Some(resume) = self.0.take() {
            resume.resume(outcome);
        }
    }
}

impl<R> Drop for Reply<R> {
    fn drop(&mut self) {
        if let Some(resume) = self.0.take() {
            resume.resume(Err(Error::Shutdown));
        }
    }
}

/// The coordinator thread owned by a [`Runtime`](crate::Runtime).
pub(crate) struct CoordinatorThread {
    handle: Coordinator,
    thread: Option<JoinHandle<()>>,
}

impl CoordinatorThread {
    /// Starts the thread with the runtime context installed, so jobs can
    /// spawn tasks and set timers.
    pub(crate) fn start(name: &str, reactor: ReactorHandle, injector: InjectorHandle) -> io::Result<Self> {
        let (sender, receiver) = mpsc::channel();

        let thread = thread::Builder::new()
            .name(format!("{name}-coordinator"))
            .spawn(move || enter_context(reactor, injector, || Self::run(receiver)))?;

        Ok(Self {
            handle: Coordinator { sender },
            thread: Some(thread),
        })
    }

    pub(crate) fn handle(&self) -> Coordinator {
        self.handle.clone()
    }

    fn run(receiver: Receiver<Message>) {
        ON_COORDINATOR.with(|flag| flag.set(true));

        while let Ok(Message::Run(job)) = receiver.recv() {
            // Panics are reported to the waiter by `Coordinator::run`;
            // fire-and-forget jobs only get logged.
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                let error = error::from_panic(payload);
                tracing::warn!(%error, "coordinator job panicked");
            }
        }

        tracing::debug!("coordinator stopped");
    }

    /// Stops the thread after the jobs already queued have run.
    pub(crate) fn shutdown(&mut self) {
        let _ = self.handle.sender.send(Message::Shutdown);

        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
