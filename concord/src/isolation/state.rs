use super::gate::{Gate, Permit};
use crate::error::ContractViolation;

use std::cell::{RefCell, UnsafeCell};
use std::fmt;

thread_local! {
    /// Addresses of the isolated states whose accessor closure is running
    /// on this thread.
    static HELD: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Marks a state as held by the current thread for the guard's lifetime.
///
/// Popped on drop, unwinding included.
struct Held(usize);

impl Held {
    fn enter(address: usize) -> Self {
        HELD.with(|held| held.borrow_mut().push(address));
        Held(address)
    }

    fn is_held(address: usize) -> bool {
        HELD.with(|held| held.borrow().contains(&address))
    }
}

impl Drop for Held {
    fn drop(&mut self) {
        HELD.with(|held| {
            let mut held = held.borrow_mut();
            if let Some(index) = held.iter().rposition(|address| *address == self.0) {
                held.remove(index);
            }
        });
    }
}

/// Mutable state with at most one accessor at a time.
///
/// Every access goes through a closure run under exclusive access:
/// [`read`](Self::read) and [`mutate`](Self::mutate) suspend the calling
/// task until the state is free, then run the closure and hand back its
/// result. Closures are synchronous, so an access can never be interleaved
/// with another one on the same instance.
///
/// A second value of type `C`, fixed at construction, can be read without
/// taking part in the exclusion through [`nonisolated`](Self::nonisolated).
///
/// Share an instance between tasks with `Arc<IsolatedState<T>>`.
///
/// # Panics
///
/// Accessing an instance from inside one of its own accessor closures raises
/// [`ContractViolation::ReentrantAccess`].
///
/// # Examples
///
/// ```rust,ignore
/// let counter = Arc::new(IsolatedState::new(0u64));
///
/// counter.mutate(|n| *n += 1).await;
/// assert_eq!(counter.read(|n| *n).await, 1);
/// ```
pub struct IsolatedState<T, C = ()> {
    gate: Gate,

    value: UnsafeCell<T>,

    constant: C,
}

// Safety: the value is only reached through a gate permit, which a single
// accessor holds at a time. The constant is never mutated.
unsafe impl<T: Send, C: Send> Send for IsolatedState<T, C> {}
unsafe impl<T: Send, C: Sync> Sync for IsolatedState<T, C> {}

impl<T> IsolatedState<T> {
    /// Wraps `value`.
    pub fn new(value: T) -> Self {
        Self::with_constant(value, ())
    }
}

impl<T, C> IsolatedState<T, C> {
    /// Wraps `value` alongside a construction-time constant.
    pub fn with_constant(value: T, constant: C) -> Self {
        Self {
            gate: Gate::new(),
            value: UnsafeCell::new(value),
            constant,
        }
    }

    /// Runs `f` with shared access to the value.
    ///
    /// Suspends until no other accessor is running.
    pub async fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.check_reentrancy();
        let permit = self.gate.acquire().await;

        // Safety: the permit grants exclusive access.
        self.enter(permit, || f(unsafe { &*self.value.get() }))
    }

    /// Runs `f` with exclusive access to the value.
    ///
    /// Suspends until no other accessor is running. The state is released
    /// before the caller resumes, even if `f` panics.
    pub async fn mutate<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        self.check_reentrancy();
        let permit = self.gate.acquire().await;

        // Safety: the permit grants exclusive access.
        self.enter(permit, || f(unsafe { &mut *self.value.get() }))
    }

    /// Like [`read`](Self::read), but returns `None` instead of suspending
    /// when the state is busy.
    pub fn try_read<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.check_reentrancy();
        let permit = self.gate.try_acquire()?;

        // Safety: the permit grants exclusive access.
        Some(self.enter(permit, || f(unsafe { &*self.value.get() })))
    }

    /// Like [`mutate`](Self::mutate), but returns `None` instead of
    /// suspending when the state is busy.
    pub fn try_mutate<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.check_reentrancy();
        let permit = self.gate.try_acquire()?;

        // Safety: the permit grants exclusive access.
        Some(self.enter(permit, || f(unsafe { &mut *self.value.get() })))
    }

    /// The construction-time constant. Never waits.
    pub fn nonisolated(&self) -> &C {
        &self.constant
    }

    /// Consumes the state and returns the value.
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }

    fn address(&self) -> usize {
        self as *const Self as usize
    }

    fn check_reentrancy(&self) {
        if Held::is_held(self.address()) {
            ContractViolation::ReentrantAccess.raise();
        }
    }

    /// Runs `f` while holding `permit`.
    ///
    /// Both guards live in this synchronous frame, so a panic in `f` drops
    /// them before it propagates.
    fn enter<R>(&self, permit: Permit<'_>, f: impl FnOnce() -> R) -> R {
        let _permit = permit;
        let _held = Held::enter(self.address());
        f()
    }
}

impl<T: Default> Default for IsolatedState<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T, C: fmt::Debug> fmt::Debug for IsolatedState<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IsolatedState")
            .field("constant", &self.constant)
            .finish_non_exhaustive()
    }
}
