//! Time utilities driven by the runtime reactor.
//!
//! - [`sleep`] suspends the current task until a deadline,
//! - [`timeout`] bounds the time a future may take.
//!
//! Neither of them reacts to task cancellation; use
//! [`task::sleep`](crate::task::sleep) for a cancellation-aware wait.

mod sleep;
mod timeout;

#[doc(inline)]
pub use sleep::{Sleep, sleep};

#[doc(inline)]
pub use timeout::{Elapsed, Timeout, timeout};
