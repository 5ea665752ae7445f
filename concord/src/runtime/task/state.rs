use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Task is idle and not scheduled.
///
/// The task exists but is suspended, waiting for a wake-up.
pub(crate) const IDLE: usize = 0;

/// Task is queued for execution.
///
/// The task has been scheduled and is waiting in a run queue.
pub(crate) const QUEUED: usize = 1;

/// Task is currently being executed by a worker.
///
/// At most one worker may observe this state at a time.
pub(crate) const RUNNING: usize = 2;

/// Task has finished; its outcome is stored and it will not be polled again.
pub(crate) const COMPLETED: usize = 3;

/// Task has been woken while running and must be re-queued afterwards.
pub(crate) const NOTIFIED: usize = 4;

/// Observable lifecycle of a task.
///
/// This is the caller-facing view; the scheduling states above are an
/// implementation detail of the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Spawned but not polled yet.
    Pending,

    /// Polled at least once and not finished (running or suspended).
    Running,

    /// Finished with a value.
    Completed,

    /// Finished because cancellation was requested.
    Cancelled,

    /// Finished with an error or a panic.
    Failed,
}

impl TaskStatus {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => TaskStatus::Pending,
            1 => TaskStatus::Running,
            2 => TaskStatus::Completed,
            3 => TaskStatus::Cancelled,
            _ => TaskStatus::Failed,
        }
    }

    pub(crate) fn as_u8(self) -> u8 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::Running => 1,
            TaskStatus::Completed => 2,
            TaskStatus::Cancelled => 3,
            TaskStatus::Failed => 4,
        }
    }

    /// Returns `true` once the task can no longer change state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Cancelled | TaskStatus::Failed
        )
    }
}

/// Process-unique identity of a spawned task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        TaskId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric identifier.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Scheduling hint attached to a task.
///
/// Priority only decides which queued task a worker picks first when the
/// global queue is contended. It never orders completion: a `High` task may
/// well finish after a `Background` one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Priority {
    Background,
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Number of distinct priority levels.
    pub(crate) const LEVELS: usize = 4;

    /// Queue index, highest priority first.
    pub(crate) fn queue_index(self) -> usize {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
            Priority::Background => 3,
        }
    }
}
