//! Error taxonomy shared by every Concord primitive.
//!
//! Three kinds of failure travel through the runtime:
//!
//! - [`Error::Cancelled`]: cooperative cancellation. Expected, never a failure.
//! - [`Error::OperationFailed`]: an error raised by collaborator code
//!   (a transport failure, a decode error, ...).
//! - [`Error::ContractViolation`]: a bug in the caller, such as resuming a
//!   continuation twice. These are raised as panics on the offending path and
//!   only show up as an `Error` when a task caught them.

use std::fmt;

/// Boxed collaborator error carried by [`Error::OperationFailed`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convenience alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by tasks, groups, bridges and the coordinator.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The unit of work observed a cancellation request.
    #[error("operation was cancelled")]
    Cancelled,

    /// An underlying collaborator failed.
    #[error("operation failed: {0}")]
    OperationFailed(#[source] BoxError),

    /// The caller broke a usage contract of a primitive.
    #[error("contract violation: {0}")]
    ContractViolation(ContractViolation),

    /// The task body panicked with a non-contract payload.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The runtime or the coordinator has shut down.
    #[error("runtime has shut down")]
    Shutdown,
}

impl Error {
    /// Wraps any collaborator error as [`Error::OperationFailed`].
    pub fn failed<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        Error::OperationFailed(error.into())
    }

    /// Returns `true` for [`Error::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Returns `true` for [`Error::ContractViolation`].
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Error::ContractViolation(_))
    }
}

impl From<ContractViolation> for Error {
    fn from(violation: ContractViolation) -> Self {
        Error::ContractViolation(violation)
    }
}

/// A programming error detected by one of the primitives.
///
/// Violations are raised with [`std::panic::panic_any`] so the payload can be
/// recovered by whoever catches the unwind. The runtime does exactly that for
/// tasks and reports [`Error::ContractViolation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractViolation {
    /// A continuation was resumed more than once.
    DoubleResume,

    /// An isolated state was accessed from inside its own accessor closure.
    ReentrantAccess,
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractViolation::DoubleResume => f.write_str("continuation resumed more than once"),
            ContractViolation::ReentrantAccess => {
                f.write_str("isolated state accessed from inside its own accessor")
            }
        }
    }
}

impl ContractViolation {
    /// Aborts the current operation path with this violation as panic payload.
    pub(crate) fn raise(self) -> ! {
        tracing::error!(violation = %self, "contract violation");
        std::panic::panic_any(self)
    }
}

/// Returns the value of `result`, or `T::default()` after logging the failure.
///
/// This is the intended shape of the presentation boundary: a failed
/// background operation renders as empty state plus a log line instead of
/// tearing down the whole surface. Cancellation is logged at `debug` since
/// it is not a failure.
pub fn or_default<T: Default>(result: Result<T>, context: &str) -> T {
    match result {
        Ok(value) => value,
        Err(Error::Cancelled) => {
            tracing::debug!(context, "operation cancelled");
            T::default()
        }
        Err(error) => {
            tracing::warn!(context, %error, "operation failed");
            T::default()
        }
    }
}

/// Converts a caught panic payload into an [`Error`].
pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Error {
    if let Some(violation) = payload.downcast_ref::<ContractViolation>() {
        return Error::ContractViolation(*violation);
    }

    if let Some(message) = payload.downcast_ref::<&'static str>() {
        return Error::Panicked((*message).to_string());
    }

    match payload.downcast::<String>() {
        Ok(message) => Error::Panicked(*message),
        Err(_) => Error::Panicked("non-string panic payload".to_string()),
    }
}
