use super::command::Command;
use super::timer::TimerEntry;

use std::collections::BinaryHeap;
use std::io;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SendError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// The reactor.
///
/// Runs on a dedicated thread and owns every pending timer. Runtime threads
/// talk to it through [`Command`] messages; it wakes the registered task
/// once a deadline passes.
pub(crate) struct Reactor {
    /// Channel receiving commands from executor threads.
    receiver: Receiver<Command>,

    /// Pending timers, earliest deadline on top.
    timers: BinaryHeap<TimerEntry>,
}

impl Reactor {
    /// Spawns the reactor thread and returns a handle to it.
    pub(crate) fn start(name: &str) -> io::Result<(ReactorHandle, JoinHandle<()>)> {
        let (sender, receiver) = mpsc::channel();

        let reactor = Reactor {
            receiver,
            timers: BinaryHeap::new(),
        };

        let thread = thread::Builder::new()
            .name(format!("{name}-reactor"))
            .spawn(move || reactor.run())?;

        Ok((ReactorHandle { sender }, thread))
    }

    /// Reactor loop: wait for the next command or the next deadline,
    /// whichever comes first, then fire expired timers.
    fn run(mut self) {
        loop {
            let command = match self.timers.peek() {
                Some(next) => {
                    let timeout = next.deadline.saturating_duration_since(Instant::now());

                    match self.receiver.recv_timeout(timeout) {
                        Ok(command) => Some(command),
                        Err(RecvTimeoutError::Timeout) => None,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                None => match self.receiver.recv() {
                    Ok(command) => Some(command),
                    Err(_) => break,
                },
            };

            match command {
                Some(Command::SetTimer {
                    deadline,
                    waker,
                    cancelled,
                }) => self.timers.push(TimerEntry {
                    deadline,
                    waker,
                    cancelled,
                }),
                Some(Command::Shutdown) => break,
                None => {}
            }

            self.fire_expired();
        }

        tracing::debug!(pending = self.timers.len(), "reactor stopped");
    }

    fn fire_expired(&mut self) {
        let now = Instant::now();

        while self.timers.peek().is_some_and(|entry| entry.deadline <= now) {
            if let Some(entry) = self.timers.pop() {
                if !entry.cancelled.load(Ordering::Acquire) {
                    entry.waker.wake();
                }
            }
        }
    }
}

/// Cloneable sending side of the reactor's command channel.
#[derive(Clone)]
pub(crate) struct ReactorHandle {
    sender: Sender<Command>,
}

impl ReactorHandle {
    pub(crate) fn send(&self, command: Command) -> Result<(), SendError<Command>> {
        self.sender.send(command)
    }
}
