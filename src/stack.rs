//! The stack API: push, put, query, pop.
//!
//! Every operation here is total: popping an empty stack is a no-op and
//! querying with no active frame yields an empty result. The ambient
//! functions operate on the calling unit's own stack via the global
//! [`Registry`]; the handle methods work against an explicit frame and are
//! the preferred surface for new code.

use crate::frame::{ContextMap, Frame, FrameValue};
use crate::identity::UnitId;
use crate::registry::{arm_thread_exit_hook, Registry};
use std::sync::Arc;
use tracing::trace;

/// A handle to one pushed frame of context data.
///
/// Handles are cheap to clone; clones refer to the same frame. Chained
/// building reads naturally:
///
/// ```rust
/// use serde_json::json;
///
/// let handle = ctxstack::enter()
///     .put("service", json!("ingest"))
///     .put_dynamic("queue_depth", || json!(0));
/// handle.exit();
/// ```
#[derive(Debug, Clone)]
pub struct ContextHandle {
    frame: Arc<Frame>,
}

impl ContextHandle {
    fn new(frame: Arc<Frame>) -> Self {
        Self { frame }
    }

    /// Inserts a static key-value pair into this frame and returns a handle
    /// to the same frame for chaining.
    ///
    /// The last put for a key within one frame wins; entries in a more
    /// nested frame shadow this one regardless.
    pub fn put(&self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.frame.put(key.into(), FrameValue::Static(value));
        self.clone()
    }

    /// Inserts a lazily evaluated entry, invoked afresh on every query.
    ///
    /// Results are never cached, so values that change between queries
    /// (elapsed time, gauge readings) stay current.
    pub fn put_dynamic(
        &self,
        key: impl Into<String>,
        f: impl Fn() -> serde_json::Value + Send + Sync + 'static,
    ) -> Self {
        self.frame.put(key.into(), FrameValue::Dynamic(Arc::new(f)));
        self.clone()
    }

    /// Pops this frame off the calling unit's stack, restoring its parent as
    /// the new top.
    ///
    /// Returns a handle to the new top, or `None` once the stack is empty.
    /// Exiting an already-empty stack is a no-op returning `None`, never an
    /// error.
    pub fn exit(&self) -> Option<Self> {
        let unit = UnitId::current();
        let registry = Registry::global();
        trace!(unit = %unit, "exiting context frame");
        match self.frame.parent() {
            Some(parent) => {
                registry.set_top(unit, parent.clone());
                Some(Self::new(parent.clone()))
            }
            None => {
                registry.remove(unit);
                None
            }
        }
    }

    /// Merges this frame's full chain root-to-top into a fresh map, the most
    /// nested entry winning per key and dynamic entries evaluated now.
    #[must_use]
    pub fn as_map(&self) -> ContextMap {
        self.frame.as_map()
    }

    /// Streams each visible key-value pair to `visitor` without building a
    /// map; each key is visited exactly once with its most nested value.
    pub fn read(&self, visitor: impl FnMut(&str, serde_json::Value)) {
        self.frame.read(visitor);
    }

    #[cfg(test)]
    pub(crate) fn frame(&self) -> &Arc<Frame> {
        &self.frame
    }
}

/// Pushes a new frame onto the calling unit's stack and returns its handle.
///
/// The new frame's parent is the unit's previous top, or nothing if the unit
/// had no active stack. Always succeeds.
pub fn enter() -> ContextHandle {
    let unit = UnitId::current();
    let registry = Registry::global();
    let frame = Arc::new(Frame::new(registry.top(unit)));
    registry.set_top(unit, frame.clone());
    arm_thread_exit_hook(unit);
    trace!(unit = %unit, "entered context frame");
    ContextHandle::new(frame)
}

/// Pops the calling unit's current top frame.
///
/// Equivalent to [`ContextHandle::exit`] on the current top; a no-op
/// returning `None` when the unit has no active stack.
pub fn exit() -> Option<ContextHandle> {
    current_handle().and_then(|handle| handle.exit())
}

/// Merges the calling unit's full stack into a fresh map.
///
/// Returns an empty map when the unit has no active stack.
#[must_use]
pub fn as_map() -> ContextMap {
    current_handle().map_or_else(ContextMap::new, |handle| handle.as_map())
}

/// Streams the calling unit's visible context to `visitor`.
///
/// Invokes the visitor zero times when the unit has no active stack.
pub fn read(visitor: impl FnMut(&str, serde_json::Value)) {
    if let Some(handle) = current_handle() {
        handle.read(visitor);
    }
}

fn current_handle() -> Option<ContextHandle> {
    Registry::global()
        .top(UnitId::current())
        .map(ContextHandle::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicI64, Ordering};

    #[test]
    fn test_enter_put_exit_scenario() {
        let outer = enter().put("a", json!(1));
        assert_eq!(as_map(), ContextMap::from([("a".into(), json!(1))]));

        let inner = enter().put("b", json!(2));
        assert_eq!(
            as_map(),
            ContextMap::from([("a".into(), json!(1)), ("b".into(), json!(2))])
        );

        let restored = inner.exit().unwrap();
        assert!(Arc::ptr_eq(restored.frame(), outer.frame()));
        assert_eq!(as_map(), ContextMap::from([("a".into(), json!(1))]));

        assert!(outer.exit().is_none());
        assert_eq!(as_map(), ContextMap::new());
    }

    #[test]
    fn test_exit_on_empty_stack_is_noop() {
        assert!(exit().is_none());

        let handle = enter();
        assert!(handle.exit().is_none());
        // The stack is already empty again; another exit still yields None.
        assert!(handle.exit().is_none());
        assert!(exit().is_none());
        assert_eq!(as_map(), ContextMap::new());
    }

    #[test]
    fn test_query_with_no_active_frame_is_empty() {
        assert_eq!(as_map(), ContextMap::new());
        let mut visits = 0;
        read(|_, _| visits += 1);
        assert_eq!(visits, 0);
    }

    #[test]
    fn test_put_returns_handle_to_same_frame() {
        let handle = enter();
        let chained = handle.put("a", json!(1)).put_dynamic("b", || json!(2));
        assert!(Arc::ptr_eq(chained.frame(), handle.frame()));
        handle.exit();
    }

    #[test]
    fn test_put_into_enclosing_frame_is_shadowed() {
        let penultimate = enter().put("b", json!(2));
        let top = enter().put_dynamic("c", || json!(4)).put("d", json!(5));

        // A put below the top never overrides the more nested entry.
        penultimate.put("c", json!(3));
        assert_eq!(as_map()["c"], json!(4));

        let restored = top.exit().unwrap();
        assert_eq!(as_map()["c"], json!(3));
        assert!(restored.exit().is_none());
    }

    #[test]
    fn test_ambient_read_matches_as_map() {
        let handle = enter().put("a", json!(1)).put("b", json!("two"));

        let mut streamed = ContextMap::new();
        read(|key, value| {
            streamed.insert(key.to_string(), value);
        });
        assert_eq!(streamed, as_map());
        handle.exit();
    }

    #[test]
    fn test_dynamic_value_changes_between_queries() {
        let counter = AtomicI64::new(0);
        let handle =
            enter().put_dynamic("x", move || json!(counter.fetch_add(1, Ordering::SeqCst)));

        assert_eq!(as_map()["x"], json!(0));
        assert_eq!(as_map()["x"], json!(1));
        handle.exit();
    }

    #[test]
    fn test_unrelated_threads_are_isolated() {
        let handle = enter().put("mine", json!(true));

        let theirs = std::thread::spawn(|| {
            let handle = enter().put("theirs", json!(true));
            let seen = as_map();
            handle.exit();
            seen
        })
        .join()
        .unwrap();

        assert!(!theirs.contains_key("mine"));
        assert!(!as_map().contains_key("theirs"));
        handle.exit();
    }
}
