//! Context frames and merge logic.
//!
//! A [`Frame`] is one pushed scope of key-value data. Frames form a singly
//! linked list from the most recent frame back to the root; queries fold the
//! whole chain with the most nested entry winning on key collisions.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// A merged snapshot of all visible context data.
pub type ContextMap = HashMap<String, serde_json::Value>;

/// A lazily evaluated context value.
type DynamicFn = Arc<dyn Fn() -> serde_json::Value + Send + Sync>;

/// One entry in a frame: either a stored value or a function evaluated at
/// query time.
#[derive(Clone)]
pub(crate) enum FrameValue {
    /// A value stored as-is.
    Static(serde_json::Value),
    /// A zero-argument function invoked on every query, never cached.
    Dynamic(DynamicFn),
}

impl FrameValue {
    /// Resolves the entry to a concrete value at query time.
    fn resolve(&self) -> serde_json::Value {
        match self {
            Self::Static(value) => value.clone(),
            Self::Dynamic(f) => f(),
        }
    }
}

impl fmt::Debug for FrameValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Self::Dynamic(_) => f.debug_tuple("Dynamic").field(&"<fn>").finish(),
        }
    }
}

/// One pushed scope of context data with a link to its enclosing scope.
///
/// Static and dynamic entries share one map, so a later put for a key
/// replaces an earlier one regardless of kind (last write within a frame
/// wins). The parent chain never cycles and terminates at the stack root.
#[derive(Debug)]
pub struct Frame {
    /// Entries for this scope, keyed by name.
    entries: RwLock<HashMap<String, FrameValue>>,
    /// The enclosing scope, or `None` at the stack root.
    parent: Option<Arc<Frame>>,
}

impl Frame {
    /// Creates a frame enclosed by `parent`.
    pub(crate) fn new(parent: Option<Arc<Frame>>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            parent,
        }
    }

    /// Returns the enclosing frame, or `None` at the stack root.
    pub(crate) fn parent(&self) -> Option<&Arc<Frame>> {
        self.parent.as_ref()
    }

    /// Inserts an entry, replacing any previous entry for the key.
    pub(crate) fn put(&self, key: String, value: FrameValue) {
        self.entries.write().insert(key, value);
    }

    /// Merges the full chain root-to-top into a fresh map.
    ///
    /// Dynamic entries are evaluated now; a more nested entry wins on key
    /// collision. The result is a pure function of this frame reference.
    #[must_use]
    pub fn as_map(&self) -> ContextMap {
        let mut merged = ContextMap::new();
        self.merge_into(&mut merged);
        merged
    }

    fn merge_into(&self, out: &mut ContextMap) {
        if let Some(parent) = &self.parent {
            parent.merge_into(out);
        }
        for (key, value) in self.snapshot_entries() {
            out.insert(key, value.resolve());
        }
    }

    /// Streams each visible key exactly once, with its most nested value, to
    /// `visitor` without building a full map.
    ///
    /// Same merge semantics as [`Frame::as_map`]; dynamic entries are
    /// evaluated as they are visited.
    pub fn read(&self, mut visitor: impl FnMut(&str, serde_json::Value)) {
        let mut seen: HashSet<String> = HashSet::new();
        let mut frame = self;
        loop {
            for (key, value) in frame.snapshot_entries() {
                if !seen.contains(&key) {
                    visitor(&key, value.resolve());
                    seen.insert(key);
                }
            }
            match &frame.parent {
                Some(parent) => frame = parent,
                None => break,
            }
        }
    }

    /// Deep-copies the chain for handoff to a spawned unit.
    ///
    /// Static values are cloned; dynamic entries share their `Arc`ed fn so
    /// they keep evaluating live after the handoff. Later puts into either
    /// chain are invisible to the other.
    pub(crate) fn snapshot_chain(self: &Arc<Self>) -> Arc<Frame> {
        let parent = self.parent.as_ref().map(Frame::snapshot_chain);
        Arc::new(Frame {
            entries: RwLock::new(self.entries.read().clone()),
            parent,
        })
    }

    // Entries are cloned out of the lock before any dynamic fn or visitor
    // runs; those callbacks are allowed to touch the stack themselves.
    fn snapshot_entries(&self) -> Vec<(String, FrameValue)> {
        self.entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
