//! # Concord
//!
//! **Concord** is an async runtime built around isolation and structured
//! concurrency. State shared between tasks lives behind an
//! [`IsolatedState`], work fans out through [`TaskGroup`]s that never leak
//! their children, and callback-style collaborators are adapted through the
//! [`bridge`] module.
//!
//! It provides:
//!
//! - A **work-stealing scheduler** with advisory task priorities
//! - **Cooperative cancellation** with explicit checkpoints
//! - **Isolated state** accessed through closures, one accessor at a time
//! - **Task groups** with throwing and tolerant failure modes
//! - **Continuation and stream bridges** for callback-based APIs
//! - A **coordinator thread** for work that must happen in one place
//! - **Macros** like `#[concord::main]`, `#[concord::test]` and `join!`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use concord::{FailureMode, IsolatedState, run_group};
//! use std::sync::Arc;
//!
//! #[concord::main]
//! async fn main() {
//!     let seen = Arc::new(IsolatedState::new(0usize));
//!
//!     let lengths = run_group(
//!         ["a", "bb", "ccc"],
//!         |word| {
//!             let seen = seen.clone();
//!             async move {
//!                 seen.mutate(|n| *n += 1).await;
//!                 Ok(word.len())
//!             }
//!         },
//!         FailureMode::Throwing,
//!     )
//!     .await;
//!
//!     println!("{lengths:?}");
//! }
//! ```
//!
//! ## Modules
//!
//! - [`task`]: spawning, handles, task sets and cancellation checkpoints
//! - [`group`]: structured task groups
//! - [`isolation`]: isolated and published state
//! - [`bridge`]: continuation and stream bridges
//! - [`time`]: sleep and timeout
//! - [`error`]: the error taxonomy

mod reactor;
mod runtime;
mod utils;

pub mod bridge;
pub mod error;
pub mod group;
pub mod isolation;
pub mod time;

pub use error::{ContractViolation, Error, Result};
pub use group::{FailureMode, GroupStream, TaskGroup, group_stream, run_group, run_group_indexed};
pub use isolation::{IsolatedState, Published};
pub use runtime::Runtime;
pub use runtime::builder::{RuntimeBuilder, WORKER_THREADS_ENV};
pub use runtime::coordinator::Coordinator;
pub use runtime::task;
pub use runtime::yield_now::yield_now;

pub use concord_macros::*;
