//! Asynchronous task primitives.
//!
//! This module defines how units of work are launched, observed and
//! cancelled:
//! - [`spawn`] / [`spawn_with_priority`] start a task and return a
//!   [`TaskHandle`],
//! - [`TaskSet`] tracks handles for bulk cancellation,
//! - [`is_cancelled`], [`check_cancellation`] and [`sleep`] are the
//!   cooperative checkpoints a task uses to honor cancellation.
//!
//! Cancellation is cooperative: [`TaskHandle::cancel`] sets a flag and wakes
//! the task, but the task only stops at a checkpoint. Whatever happens, a
//! task whose cancellation was requested before it finished reports
//! [`TaskStatus::Cancelled`].

pub(crate) mod core;
pub(crate) mod current;
pub(crate) mod handle;
pub(crate) mod set;
pub(crate) mod state;

pub(crate) use self::core::{Runnable, SpawnOptions, Task, TaskControl};

pub use self::core::{spawn, spawn_with_priority};
pub use current::{check_cancellation, current_id, is_cancelled, sleep};
pub use handle::{CancelHandle, TaskHandle};
pub use set::TaskSet;
pub use state::{Priority, TaskId, TaskStatus};

pub use crate::runtime::yield_now::yield_now;
