//! Serialized access to shared mutable state.
//!
//! [`IsolatedState`] admits one accessor at a time; callers suspend until
//! their turn. [`Published`] adds change notification on top of it.

mod gate;
mod published;
mod state;

pub use published::Published;
pub use state::IsolatedState;
