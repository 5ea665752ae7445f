//! Core runtime components.
//!
//! This module contains the executor that drives tasks, the thread-local
//! context that lets primitives find their runtime, the coordinator thread
//! used as an explicit hand-off target, and the task API itself.
//!
//! Most users interact with [`Runtime`], [`RuntimeBuilder`](builder::RuntimeBuilder)
//! and the [`task`] module rather than with the internals.

mod executor;
mod work_stealing;

pub(crate) mod builder;
pub(crate) mod context;
pub(crate) mod coordinator;
pub(crate) mod core;
pub(crate) mod yield_now;

pub mod task;

pub use self::core::Runtime;
