//! Small helpers shared by the runtime internals.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks a standard mutex, recovering the data if a previous holder panicked.
///
/// Runtime-internal mutexes never run user code while locked, so a poisoned
/// lock only means some unrelated thread unwound; the protected data is
/// still consistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
