//! Structured fan-out.
//!
//! A [`TaskGroup`] owns a set of child tasks: it joins them in completion
//! order and cancels them when its owner is cancelled or when it is dropped.
//! [`run_group`], [`run_group_indexed`] and [`group_stream`] cover the common
//! "one child per item" shapes.

mod run;
mod stream;
mod task_group;

pub use run::{FailureMode, run_group, run_group_indexed};
pub use stream::{GroupStream, group_stream};
pub use task_group::TaskGroup;
