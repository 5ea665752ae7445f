//! Task executor implementation.
//!
//! - [`core`]: the executor itself and its lifecycle,
//! - [`worker`]: worker threads that run tasks using work-stealing.

pub(crate) mod core;
pub(crate) mod worker;
