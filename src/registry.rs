//! Process-wide registry mapping live execution units to their top frames.

use crate::frame::Frame;
use crate::identity::UnitId;
use parking_lot::RwLock;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use tracing::trace;

/// Maps each live execution unit to its current top frame.
///
/// The registry is the only shared mutable structure in the crate. Lookups
/// take the read lock; structure changes (first push, last pop, reclamation)
/// take the write lock. An entry exists exactly while its unit has at least
/// one frame pushed.
///
/// Entries do not keep terminated units alive: units are tracked by identity
/// only, and a termination hook (thread-local destructor for threads, scope
/// guard for spawned tasks) removes the entry when the unit ends without
/// popping its stack.
#[derive(Debug, Default)]
pub struct Registry {
    tops: RwLock<HashMap<UnitId, Arc<Frame>>>,
}

/// The process-wide registry used by the ambient API.
static GLOBAL: LazyLock<Registry> = LazyLock::new(Registry::new);

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide registry.
    ///
    /// Created once on first use and never torn down in normal operation;
    /// test suites reset it with [`Registry::clear`].
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Returns the unit's current top frame, or `None` if it has no active
    /// stack.
    #[must_use]
    pub fn top(&self, unit: UnitId) -> Option<Arc<Frame>> {
        self.tops.read().get(&unit).cloned()
    }

    /// Records `frame` as the unit's current top.
    pub fn set_top(&self, unit: UnitId, frame: Arc<Frame>) {
        self.tops.write().insert(unit, frame);
    }

    /// Removes the unit's entry. A no-op if no entry exists.
    pub fn remove(&self, unit: UnitId) {
        self.tops.write().remove(&unit);
    }

    /// Returns the number of units with an active stack.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tops.read().len()
    }

    /// Returns true if no unit has an active stack.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tops.read().is_empty()
    }

    /// Removes every entry, restoring the known-empty state for tests.
    pub fn clear(&self) {
        self.tops.write().clear();
    }
}

thread_local! {
    static EXIT_HOOK: RefCell<Option<ThreadExitHook>> = const { RefCell::new(None) };
}

/// Removes a thread unit's global-registry entry when the thread terminates,
/// whether or not it popped its stack.
struct ThreadExitHook {
    unit: UnitId,
}

impl Drop for ThreadExitHook {
    fn drop(&mut self) {
        trace!(unit = %self.unit, "reclaiming registry entry for terminated thread");
        Registry::global().remove(self.unit);
    }
}

/// Arms the calling thread's exit hook, once. Task units are reclaimed by
/// the spawn wrapper's scope guard instead.
pub(crate) fn arm_thread_exit_hook(unit: UnitId) {
    if unit.is_task() {
        return;
    }
    EXIT_HOOK.with(|hook| {
        let mut hook = hook.borrow_mut();
        if hook.is_none() {
            *hook = Some(ThreadExitHook { unit });
        }
    });
}
