//! Timer reactor.
//!
//! The reactor runs on its own thread, independently from the executor.
//! It keeps a min-heap of deadlines and wakes the owning task when one
//! expires. [`Sleep`](crate::time::sleep) and everything built on it
//! (timeouts, cancellation-aware sleeps) register timers through it.

mod core;
mod timer;

pub(crate) mod command;

pub(crate) use self::core::{Reactor, ReactorHandle};
