//! Subscription registry
//!
//! Holds two ordered collections of listener lists:
//! - exact topics, keyed by the topic string
//! - wildcard patterns, kept in the order their key was first registered
//!
//! A list never stays empty; removing its last listener removes the key.

use crate::handler::Handler;
use crate::pattern::{is_wildcard, TopicPattern};
use crate::EventBusResult;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of one registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    fn next() -> Self {
        SubscriptionId(NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// One registered handler.
#[derive(Debug, Clone)]
pub(crate) struct Listener {
    pub id: SubscriptionId,
    pub key: String,
    pub handler: Handler,
    pub context: Option<serde_json::Value>,
    pub once: bool,
}

#[derive(Debug)]
struct WildcardList {
    pattern: TopicPattern,
    listeners: Vec<Listener>,
}

#[derive(Debug, Default)]
pub(crate) struct Registry {
    exact: BTreeMap<String, Vec<Listener>>,
    wildcard: Vec<WildcardList>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener under `key`.
    pub fn insert(
        &mut self,
        key: &str,
        handler: Handler,
        context: Option<serde_json::Value>,
        once: bool,
    ) -> EventBusResult<SubscriptionId> {
        let pattern = TopicPattern::compile(key)?;
        let listener = Listener {
            id: SubscriptionId::next(),
            key: key.to_string(),
            handler,
            context,
            once,
        };
        let id = listener.id;

        if pattern.is_wildcard() {
            match self.wildcard.iter_mut().find(|list| list.pattern.as_str() == key) {
                Some(list) => list.listeners.push(listener),
                None => self.wildcard.push(WildcardList {
                    pattern,
                    listeners: vec![listener],
                }),
            }
        } else {
            self.exact.entry(key.to_string()).or_default().push(listener);
        }

        Ok(id)
    }

    /// Remove one entry. Returns `false` if it was already gone.
    pub fn remove_id(&mut self, key: &str, id: SubscriptionId) -> bool {
        self.retain(key, |listener| listener.id != id) > 0
    }

    /// Remove every entry under `key`, or only those for `handler`.
    /// Returns how many entries were removed.
    pub fn remove(&mut self, key: &str, handler: Option<&Handler>) -> usize {
        match handler {
            Some(handler) => self.retain(key, |listener| listener.handler != *handler),
            None => self.retain(key, |_| false),
        }
    }

    fn retain<F>(&mut self, key: &str, keep: F) -> usize
    where
        F: Fn(&Listener) -> bool,
    {
        if is_wildcard(key) {
            let Some(index) = self.wildcard.iter().position(|list| list.pattern.as_str() == key)
            else {
                return 0;
            };
            let list = &mut self.wildcard[index].listeners;
            let before = list.len();
            list.retain(|listener| keep(listener));
            let removed = before - list.len();
            if list.is_empty() {
                self.wildcard.remove(index);
            }
            removed
        } else {
            let Some(list) = self.exact.get_mut(key) else {
                return 0;
            };
            let before = list.len();
            list.retain(|listener| keep(listener));
            let removed = before - list.len();
            if list.is_empty() {
                self.exact.remove(key);
            }
            removed
        }
    }

    /// Snapshot of the listeners an emission to `topic` reaches:
    /// exact listeners first, then each matching wildcard list.
    pub fn resolve(&self, topic: &str) -> Vec<Listener> {
        let mut matched: Vec<Listener> = self.exact.get(topic).cloned().unwrap_or_default();
        for list in &self.wildcard {
            if list.pattern.matches(topic) {
                matched.extend(list.listeners.iter().cloned());
            }
        }
        matched
    }

    pub fn count(&self, topic: &str) -> usize {
        let exact = self.exact.get(topic).map_or(0, Vec::len);
        let wildcard: usize = self
            .wildcard
            .iter()
            .filter(|list| list.pattern.matches(topic))
            .map(|list| list.listeners.len())
            .sum();
        exact + wildcard
    }

    pub fn contains(&self, key: &str, id: SubscriptionId) -> bool {
        if is_wildcard(key) {
            self.wildcard
                .iter()
                .filter(|list| list.pattern.as_str() == key)
                .any(|list| list.listeners.iter().any(|l| l.id == id))
        } else {
            self.exact
                .get(key)
                .is_some_and(|list| list.iter().any(|l| l.id == id))
        }
    }

    /// Exact keys (sorted), then wildcard keys (registration order).
    pub fn keys(&self) -> Vec<String> {
        self.exact
            .keys()
            .cloned()
            .chain(self.wildcard.iter().map(|list| list.pattern.as_str().to_string()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.exact.values().map(Vec::len).sum::<usize>()
            + self.wildcard.iter().map(|list| list.listeners.len()).sum::<usize>()
    }

    pub fn clear(&mut self) {
        self.exact.clear();
        self.wildcard.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Handler {
        Handler::new(|_| Ok(()))
    }

    #[test]
    fn test_insert_routes_by_wildcard() {
        let mut registry = Registry::new();
        registry.insert("a:b", noop(), None, false).unwrap();
        registry.insert("a:*", noop(), None, false).unwrap();
        registry.insert("*", noop(), None, false).unwrap();

        assert_eq!(registry.keys(), vec!["a:b", "a:*", "*"]);
        assert_eq!(registry.count("a:b"), 3);
        assert_eq!(registry.count("a:c"), 2);
        assert_eq!(registry.count("b:c"), 1);
    }

    #[test]
    fn test_resolve_order() {
        let mut registry = Registry::new();
        let star = registry.insert("*", noop(), None, false).unwrap();
        let ns = registry.insert("a:*", noop(), None, false).unwrap();
        let exact1 = registry.insert("a:b", noop(), None, false).unwrap();
        let exact2 = registry.insert("a:b", noop(), None, false).unwrap();
        let star2 = registry.insert("*", noop(), None, false).unwrap();

        let ids: Vec<_> = registry.resolve("a:b").iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![exact1, exact2, star, star2, ns]);
    }

    #[test]
    fn test_remove_id_is_idempotent_and_drops_empty_keys() {
        let mut registry = Registry::new();
        let id = registry.insert("a:*", noop(), None, false).unwrap();

        assert!(registry.contains("a:*", id));
        assert!(registry.remove_id("a:*", id));
        assert!(!registry.remove_id("a:*", id));
        assert!(!registry.contains("a:*", id));
        assert!(registry.keys().is_empty());
    }

    #[test]
    fn test_remove_by_handler() {
        let mut registry = Registry::new();
        let keep = noop();
        let gone = noop();
        registry.insert("x", keep.clone(), None, false).unwrap();
        registry.insert("x", gone.clone(), None, true).unwrap();
        registry.insert("x", gone.clone(), None, false).unwrap();

        assert_eq!(registry.remove("x", Some(&gone)), 2);
        assert_eq!(registry.count("x"), 1);
        assert_eq!(registry.resolve("x")[0].handler, keep);
    }

    #[test]
    fn test_bulk_remove() {
        let mut registry = Registry::new();
        registry.insert("x", noop(), None, false).unwrap();
        registry.insert("x", noop(), None, false).unwrap();
        registry.insert("x:*", noop(), None, false).unwrap();

        assert_eq!(registry.remove("x", None), 2);
        assert_eq!(registry.keys(), vec!["x:*"]);
        assert_eq!(registry.remove("missing", None), 0);
    }

    #[test]
    fn test_exact_key_never_treated_as_pattern() {
        let mut registry = Registry::new();
        registry.insert("a.b", noop(), None, false).unwrap();
        assert_eq!(registry.count("aXb"), 0);
        assert_eq!(registry.count("a.b"), 1);
    }

    #[test]
    fn test_clear() {
        let mut registry = Registry::new();
        registry.insert("x", noop(), None, false).unwrap();
        registry.insert("*", noop(), None, false).unwrap();
        assert_eq!(registry.len(), 2);

        registry.clear();
        assert_eq!(registry.len(), 0);
        assert!(registry.keys().is_empty());
    }

    #[test]
    fn test_empty_key_rejected() {
        let mut registry = Registry::new();
        assert!(registry.insert("", noop(), None, false).is_err());
        assert_eq!(registry.len(), 0);
    }
}
