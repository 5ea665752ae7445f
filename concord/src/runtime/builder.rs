use super::Runtime;

use std::io;
use std::thread;

/// Environment variable read by [`RuntimeBuilder::from_env`].
pub const WORKER_THREADS_ENV: &str = "CONCORD_WORKER_THREADS";

/// Builder for configuring and creating a runtime.
///
/// # Examples
///
/// ```rust,ignore
/// let runtime = RuntimeBuilder::new()
///     .worker_threads(4)
///     .thread_name("fetcher")
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct RuntimeBuilder {
    /// Number of worker threads in the executor.
    worker_threads: usize,

    /// Prefix of every thread the runtime starts.
    thread_name: String,

    /// Whether to start the coordinator thread.
    coordinator: bool,
}

impl RuntimeBuilder {
    /// Creates a builder with default configuration.
    ///
    /// By default, the number of worker threads is set to the number
    /// of available logical CPUs, falling back to `1` if unavailable,
    /// and the coordinator thread is enabled.
    pub fn new() -> Self {
        let worker_threads = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self {
            worker_threads,
            thread_name: "concord".to_string(),
            coordinator: true,
        }
    }

    /// Creates a builder with defaults overridden by the environment.
    ///
    /// Reads [`WORKER_THREADS_ENV`]; values that are not a positive integer
    /// are ignored with a warning.
    pub fn from_env() -> Self {
        let builder = Self::new();

        let Ok(raw) = std::env::var(WORKER_THREADS_ENV) else {
            return builder;
        };

        match raw.trim().parse::<usize>() {
            Ok(n) if n > 0 => builder.worker_threads(n),
            _ => {
                tracing::warn!(
                    variable = WORKER_THREADS_ENV,
                    value = %raw,
                    "ignoring invalid worker thread count"
                );
                builder
            }
        }
    }

    /// Sets the number of worker threads used by the runtime.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn worker_threads(mut self, n: usize) -> Self {
        assert!(n > 0, "worker_threads must be > 0");

        self.worker_threads = n;
        self
    }

    /// Sets the prefix used to name runtime threads.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Enables or disables the coordinator thread.
    pub fn coordinator(mut self, enabled: bool) -> Self {
        self.coordinator = enabled;
        self
    }

    /// Builds the runtime, starting the reactor, the workers and (unless
    /// disabled) the coordinator.
    ///
    /// Fails only if a thread cannot be spawned.
    pub fn build(self) -> io::Result<Runtime> {
        Runtime::new(self.worker_threads, &self.thread_name, self.coordinator)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
