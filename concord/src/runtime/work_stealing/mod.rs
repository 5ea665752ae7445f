//! Work-stealing scheduler components.
//!
//! - [`injector`]: the global queue, split into priority lanes, that also
//!   parks idle workers,
//! - [`queue`]: per-worker local queues used for fast local execution
//!   and task stealing.

pub(crate) mod injector;
pub(crate) mod queue;
