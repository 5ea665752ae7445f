//! Adapters from callback-style APIs to `async`.
//!
//! - [`continuation`] turns a one-shot callback into a future.
//! - [`stream`] turns a multi-shot callback into an ordered stream.
//!
//! Both hand a completion half to the callback side. The halves are
//! `Send + Sync`, so collaborators may complete from any thread.

mod continuation;
mod stream;

pub use continuation::{Continuation, Resume, continuation};
pub use stream::{BridgedStream, BufferPolicy, Termination, YieldResult, Yielder, stream, stream_with_policy};
