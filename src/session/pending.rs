//! Outstanding per-key requests.
//!
//! Each key has at most one request in flight. Starting a request records
//! the value shown before the edit and hands back a fresh [`RequestId`]; the
//! reply carries that id back. A reply whose id does not match the
//! outstanding request for its key is stale and is ignored.

use std::collections::HashMap;
use std::hash::Hash;

/// Identifier of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

#[derive(Debug, Clone)]
struct Entry<V> {
    id: RequestId,
    prior: V,
}

/// Outstanding requests keyed by parameter.
#[derive(Debug, Clone)]
pub struct PendingTable<K, V> {
    next_id: u64,
    entries: HashMap<K, Entry<V>>,
}

impl<K: Eq + Hash + Copy, V> PendingTable<K, V> {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: 1,
            entries: HashMap::new(),
        }
    }

    /// Start a request for `key`, remembering `prior` for rollback.
    ///
    /// Returns `None` if a request for `key` is already outstanding.
    pub fn begin(&mut self, key: K, prior: V) -> Option<RequestId> {
        if self.entries.contains_key(&key) {
            return None;
        }
        let id = RequestId(self.next_id);
        self.next_id += 1;
        self.entries.insert(key, Entry { id, prior });
        Some(id)
    }

    /// Finish the request `id` for `key`, returning the prior value.
    ///
    /// Returns `None`, and leaves the table untouched, if `id` is not the
    /// outstanding request for `key`.
    pub fn complete(&mut self, key: K, id: RequestId) -> Option<V> {
        match self.entries.get(&key) {
            Some(entry) if entry.id == id => self.entries.remove(&key).map(|e| e.prior),
            _ => None,
        }
    }

    /// Whether a request for `key` is outstanding.
    #[must_use]
    pub fn is_pending(&self, key: K) -> bool {
        self.entries.contains_key(&key)
    }

    /// Whether nothing is outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget every outstanding request. Replies to them become stale.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<K: Eq + Hash + Copy, V> Default for PendingTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_request_per_key() {
        let mut table = PendingTable::new();
        let id = table.begin("adc-range", 0.2).unwrap();
        assert!(table.begin("adc-range", 0.5).is_none());
        assert!(table.begin("trigger", 0.0).is_some());
        assert_eq!(table.complete("adc-range", id), Some(0.2));
        assert!(!table.is_pending("adc-range"));
    }

    #[test]
    fn test_stale_reply_ignored() {
        let mut table = PendingTable::new();
        let first = table.begin("plug", 1).unwrap();
        assert_eq!(table.complete("plug", first), Some(1));
        let second = table.begin("plug", 2).unwrap();
        assert_ne!(first, second);

        assert_eq!(table.complete("plug", first), None);
        assert!(table.is_pending("plug"));
        assert_eq!(table.complete("plug", second), Some(2));
    }

    #[test]
    fn test_clear_makes_replies_stale() {
        let mut table = PendingTable::new();
        let id = table.begin(1u8, "x").unwrap();
        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.complete(1u8, id), None);
    }
}
