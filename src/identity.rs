//! Execution-unit identity for registry keying.

use std::fmt;
use std::thread::ThreadId;

/// Identifies the execution unit (tokio task or OS thread) running the
/// calling code.
///
/// Task identity takes precedence: a tokio task keeps the same `UnitId` even
/// when the scheduler migrates it between worker threads, so the registry
/// entry follows the task rather than whichever thread happens to poll it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitId {
    /// A tokio task, identified by its runtime-assigned task ID.
    Task(tokio::task::Id),
    /// An OS thread outside any tokio task.
    Thread(ThreadId),
}

impl UnitId {
    /// Returns the identity of the calling execution unit.
    #[must_use]
    pub fn current() -> Self {
        match tokio::task::try_id() {
            Some(id) => Self::Task(id),
            None => Self::Thread(std::thread::current().id()),
        }
    }

    /// Returns true if this identity refers to a tokio task.
    #[must_use]
    pub fn is_task(&self) -> bool {
        matches!(self, Self::Task(_))
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Task(id) => write!(f, "task/{id}"),
            Self::Thread(id) => write!(f, "thread/{id:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_outside_runtime_is_thread() {
        let unit = UnitId::current();
        assert!(!unit.is_task());
        assert_eq!(unit, UnitId::Thread(std::thread::current().id()));
    }

    #[test]
    fn test_distinct_threads_have_distinct_ids() {
        let here = UnitId::current();
        let there = std::thread::spawn(UnitId::current)
            .join()
            .unwrap();
        assert_ne!(here, there);
    }

    #[tokio::test]
    async fn test_current_inside_task_is_task() {
        let unit = tokio::spawn(async { UnitId::current() }).await.unwrap();
        assert!(unit.is_task());
    }

    #[test]
    fn test_display_is_prefixed() {
        let unit = UnitId::current();
        assert!(unit.to_string().starts_with("thread/"));
    }
}
