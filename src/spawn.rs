//! Propagation wrappers seeding spawned units with the caller's context.
//!
//! [`spawn`] and [`spawn_thread`] capture a snapshot of the calling unit's
//! stack and install it as the new unit's registry top before its body runs,
//! so nested calls in the child see the parent's visible data without
//! re-entering manually. The handoff is one-directional: neither side ever
//! observes puts the other makes afterwards.

use crate::frame::Frame;
use crate::identity::UnitId;
use crate::registry::Registry;
use std::future::Future;
use std::sync::Arc;
use std::thread;
use tokio::task::JoinHandle;
use tracing::trace;

/// Removes the owning unit's registry entry when its body finishes, exited
/// or not (including on panic).
struct ScopeGuard {
    unit: UnitId,
}

impl ScopeGuard {
    fn arm() -> Self {
        Self {
            unit: UnitId::current(),
        }
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        trace!(unit = %self.unit, "reclaiming registry entry for finished unit");
        Registry::global().remove(self.unit);
    }
}

fn capture_snapshot() -> Option<Arc<Frame>> {
    Registry::global()
        .top(UnitId::current())
        .map(|top| top.snapshot_chain())
}

fn seed(guard: &ScopeGuard, snapshot: Option<Arc<Frame>>) {
    if let Some(frame) = snapshot {
        trace!(unit = %guard.unit, "seeding spawned unit with context snapshot");
        Registry::global().set_top(guard.unit, frame);
    }
}

/// Spawns a tokio task that starts with a snapshot of the caller's context.
///
/// The snapshot is installed before the first statement of `future` runs.
/// The task manages its own push/pop lifecycle from there; whatever it
/// leaves pushed is reclaimed when the task finishes. A caller with no
/// active stack spawns a task with none either.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let snapshot = capture_snapshot();
    tokio::spawn(async move {
        let guard = ScopeGuard::arm();
        seed(&guard, snapshot);
        future.await
    })
}

/// Spawns an OS thread that starts with a snapshot of the caller's context.
///
/// Same contract as [`spawn`] for code running outside a tokio runtime.
pub fn spawn_thread<F, T>(f: F) -> thread::JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let snapshot = capture_snapshot();
    thread::spawn(move || {
        let guard = ScopeGuard::arm();
        seed(&guard, snapshot);
        f()
    })
}
