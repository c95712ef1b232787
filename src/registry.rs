//! Shared behavior registry.
//!
//! One registry exists per decorated definition. Every wire built from that
//! definition holds the same `Arc<BehaviorRegistry>`, so a behavior attached
//! once is visible from all of them.

use crate::call::{Call, Func};
use crate::error::Result;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A named sub-behavior attached to a decorated definition.
#[derive(Clone)]
pub enum Behavior {
    /// Invoked with the wire's pre-arguments prepended.
    Callable(Func),
    /// Handed back as-is on resolution.
    Value(Value),
}

impl Behavior {
    pub fn callable<F>(f: F) -> Self
    where
        F: Fn(Call) -> Result<Value> + Send + Sync + 'static,
    {
        Behavior::Callable(Arc::new(f))
    }

    pub fn value(value: Value) -> Self {
        Behavior::Value(value)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Behavior::Callable(_))
    }
}

impl From<Func> for Behavior {
    fn from(f: Func) -> Self {
        Behavior::Callable(f)
    }
}

impl From<Value> for Behavior {
    fn from(value: Value) -> Self {
        Behavior::Value(value)
    }
}

impl fmt::Debug for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Behavior::Callable(_) => write!(f, "Behavior::Callable(..)"),
            Behavior::Value(v) => write!(f, "Behavior::Value({})", v),
        }
    }
}

#[derive(Clone)]
pub(crate) struct Slot {
    pub(crate) behavior: Behavior,
    pub(crate) stamp: u64,
}

/// Name -> behavior mapping shared by every wire of one definition.
///
/// Each attachment is stamped so wires can tell a memoized binding from a
/// replaced one.
#[derive(Default)]
pub struct BehaviorRegistry {
    attrs: DashMap<String, Slot>,
    stamp: AtomicU64,
}

impl BehaviorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `behavior` under `name`, replacing any previous one.
    pub fn attach(&self, name: impl Into<String>, behavior: impl Into<Behavior>) {
        let name = name.into();
        let behavior = behavior.into();
        debug!("Attaching behavior '{}' ({:?})", name, behavior);

        // Stamps are drawn under the entry lock so they rise in store order.
        match self.attrs.entry(name) {
            Entry::Occupied(mut entry) => {
                let stamp = self.next_stamp();
                entry.insert(Slot { behavior, stamp });
                debug!("Behavior '{}' replaced", entry.key());
            }
            Entry::Vacant(entry) => {
                let stamp = self.next_stamp();
                entry.insert(Slot { behavior, stamp });
            }
        }
    }

    fn next_stamp(&self) -> u64 {
        self.stamp.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn get(&self, name: &str) -> Option<Behavior> {
        self.attrs.get(name).map(|slot| slot.behavior.clone())
    }

    pub(crate) fn slot(&self, name: &str) -> Option<Slot> {
        self.attrs.get(name).map(|slot| slot.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    /// Attached names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.attrs.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}

impl fmt::Debug for BehaviorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorRegistry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attach_and_get() {
        let registry = BehaviorRegistry::new();
        assert!(registry.is_empty());

        registry.attach("key", Behavior::callable(|_| Ok(json!("key"))));
        registry.attach("ttl", json!(60));

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("key"));
        assert!(registry.get("key").is_some_and(|b| b.is_callable()));
        assert!(matches!(registry.get("ttl"), Some(Behavior::Value(v)) if v == json!(60)));
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.names(), vec!["key".to_string(), "ttl".to_string()]);
    }

    #[test]
    fn test_reattach_bumps_stamp() {
        let registry = BehaviorRegistry::new();
        registry.attach("key", json!(1));
        let first = registry.slot("key").map(|s| s.stamp);

        registry.attach("key", json!(2));
        let second = registry.slot("key").map(|s| s.stamp);

        assert_ne!(first, second);
        assert!(matches!(registry.get("key"), Some(Behavior::Value(v)) if v == json!(2)));
        assert_eq!(registry.len(), 1);
    }
}
