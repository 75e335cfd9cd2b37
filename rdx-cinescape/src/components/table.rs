//! The ordered callback table shared by named-event hubs and breakpoint hubs.

use crate::common::Callback;
use slotmap::{Key, SlotMap};
use std::collections::HashMap;
use std::hash::Hash;

struct Entry<K, P> {
    key: K,
    callback: Callback<P>,
    once: bool,
}

/// Callbacks grouped by key, each group kept in registration order.
pub(crate) struct CallbackTable<K, I: Key, P> {
    entries: SlotMap<I, Entry<K, P>>,
    order: HashMap<K, Vec<I>>,
}

impl<K, I, P> CallbackTable<K, I, P>
where
    K: Eq + Hash + Clone,
    I: Key,
{
    pub(crate) fn new() -> Self {
        Self {
            entries: SlotMap::with_key(),
            order: HashMap::new(),
        }
    }

    /// Appends a callback to the end of `key`'s list.
    pub(crate) fn insert(&mut self, key: K, callback: Callback<P>, once: bool) -> I {
        let id = self.entries.insert(Entry {
            key: key.clone(),
            callback,
            once,
        });
        self.order.entry(key).or_default().push(id);
        id
    }

    /// Removes every registration of `callback` under `key`.
    /// Returns `true` if at least one was found.
    pub(crate) fn remove(&mut self, key: &K, callback: &Callback<P>) -> bool {
        let Some(ids) = self.order.get_mut(key) else {
            return false;
        };
        let entries = &mut self.entries;
        let before = ids.len();
        ids.retain(|id| match entries.get(*id) {
            Some(entry) if entry.callback.same(callback) => {
                entries.remove(*id);
                false
            }
            _ => true,
        });
        let removed = ids.len() != before;
        if ids.is_empty() {
            self.order.remove(key);
        }
        removed
    }

    pub(crate) fn remove_id(&mut self, id: I) -> bool {
        let Some(entry) = self.entries.remove(id) else {
            return false;
        };
        if let Some(ids) = self.order.get_mut(&entry.key) {
            ids.retain(|other| *other != id);
            if ids.is_empty() {
                self.order.remove(&entry.key);
            }
        }
        true
    }

    pub(crate) fn clear(&mut self, key: &K) {
        if let Some(ids) = self.order.remove(key) {
            for id in ids {
                self.entries.remove(id);
            }
        }
    }

    pub(crate) fn clear_all(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub(crate) fn contains_key(&self, key: &K) -> bool {
        self.order.contains_key(key)
    }

    pub(crate) fn len(&self, key: &K) -> usize {
        self.order.get(key).map_or(0, Vec::len)
    }

    /// Collects the callbacks to run for one dispatch of `key`.
    ///
    /// One-shot registrations are unregistered here, before any callback body runs.
    pub(crate) fn take_snapshot(&mut self, key: &K) -> Vec<Callback<P>> {
        let Some(ids) = self.order.get(key).cloned() else {
            return Vec::new();
        };
        let mut callbacks = Vec::with_capacity(ids.len());
        for id in ids {
            let once = match self.entries.get(id) {
                Some(entry) => {
                    callbacks.push(entry.callback.clone());
                    entry.once
                }
                None => false,
            };
            if once {
                self.remove_id(id);
            }
        }
        callbacks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ListenerId;

    type Table = CallbackTable<&'static str, ListenerId, ()>;

    #[test]
    fn remove_drops_every_occurrence() {
        let mut table = Table::new();
        let cb = Callback::new(|_: &()| {});
        let other = Callback::new(|_: &()| {});
        table.insert("solve", cb.clone(), false);
        table.insert("solve", other.clone(), false);
        table.insert("solve", cb.clone(), false);

        assert!(table.remove(&"solve", &cb));
        assert_eq!(table.len(&"solve"), 1);
        assert!(!table.remove(&"solve", &cb));
        assert!(table.remove(&"solve", &other));
        assert!(!table.contains_key(&"solve"));
    }

    #[test]
    fn snapshot_unregisters_once_entries() {
        let mut table = Table::new();
        table.insert("step", Callback::new(|_: &()| {}), true);
        table.insert("step", Callback::new(|_: &()| {}), false);

        assert_eq!(table.take_snapshot(&"step").len(), 2);
        assert_eq!(table.take_snapshot(&"step").len(), 1);
    }

    #[test]
    fn remove_id_keeps_other_registrations() {
        let mut table = Table::new();
        let cb = Callback::new(|_: &()| {});
        let first = table.insert("miss", cb.clone(), false);
        table.insert("miss", cb, false);

        assert!(table.remove_id(first));
        assert!(!table.remove_id(first));
        assert_eq!(table.len(&"miss"), 1);
    }
}
