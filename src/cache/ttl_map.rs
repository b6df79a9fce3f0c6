//! Process-local mapping from string key to (value, expiration). SPEC_FULL
//! §4.1. None of the map operations can fail — `Set`/`SetWithTTL` always
//! succeed, matching the teacher's Redis `set_ex` calls except the TTL and
//! eviction bookkeeping now live in-process instead of in the cache server.

use crate::clock::{system_clock, SharedClock};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

struct TtlEntry {
    value: Value,
    expiration: DateTime<Utc>,
}

impl TtlEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expiration
    }
}

pub struct TtlMap {
    entries: RwLock<HashMap<String, TtlEntry>>,
    default_ttl: Duration,
    clock: SharedClock,
}

impl TtlMap {
    pub fn new(default_ttl: Duration) -> Self {
        Self::with_clock(default_ttl, system_clock())
    }

    pub fn with_clock(default_ttl: Duration, clock: SharedClock) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
            clock,
        }
    }

    /// Returns the value only if `now <= expiration`. An expired read
    /// upgrades to an exclusive lock, re-checks expiration (double-checked,
    /// to tolerate a racing refresh that landed between the shared unlock
    /// and the exclusive lock), and deletes only if still expired.
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = self.clock.now();
        {
            let guard = self.entries.read().expect("ttl map poisoned");
            match guard.get(key) {
                Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
                None => return None,
                Some(_) => {} // expired; fall through to the exclusive path
            }
        }

        let mut guard = self.entries.write().expect("ttl map poisoned");
        match guard.get(key) {
            Some(entry) if entry.is_expired(self.clock.now()) => {
                guard.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        let ttl = self.default_ttl;
        self.set_with_ttl(key, value, ttl);
    }

    /// A negative or zero TTL produces an entry that is immediately expired
    /// on the next read.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: Value, ttl: Duration) {
        let expiration = self.clock.now() + ttl;
        let mut guard = self.entries.write().expect("ttl map poisoned");
        guard.insert(key.into(), TtlEntry { value, expiration });
    }

    pub fn delete(&self, key: &str) {
        let mut guard = self.entries.write().expect("ttl map poisoned");
        guard.remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("ttl map poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scans and deletes every entry expired as of now, under a single
    /// exclusive lock. Intended to be driven by a periodic background task
    /// (every 5 minutes per §4.1), not called per-request.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut guard = self.entries.write().expect("ttl map poisoned");
        let before = guard.len();
        guard.retain(|_, entry| !entry.is_expired(now));
        before - guard.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn given_fresh_entry_when_get_before_ttl_then_returns_value() {
        let map = TtlMap::new(Duration::hours(1));
        map.set("k", json!("v"));
        assert_eq!(map.get("k"), Some(json!("v")));
    }

    #[test]
    fn given_expired_entry_when_get_then_returns_none_and_evicts() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let map = TtlMap::with_clock(Duration::hours(1), clock.clone());
        map.set_with_ttl("k", json!("v"), Duration::milliseconds(50));
        clock.advance(Duration::milliseconds(100));
        assert_eq!(map.get("k"), None);
        assert_eq!(map.len(), 0);
    }

    #[test]
    fn given_negative_ttl_when_get_immediately_then_already_expired() {
        let map = TtlMap::new(Duration::hours(1));
        map.set_with_ttl("k", json!("v"), Duration::seconds(-1));
        assert_eq!(map.get("k"), None);
    }

    #[test]
    fn given_sweep_when_entries_mixed_then_only_expired_removed() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let map = TtlMap::with_clock(Duration::hours(1), clock.clone());
        map.set_with_ttl("expired", json!(1), Duration::milliseconds(10));
        map.set_with_ttl("alive", json!(2), Duration::hours(2));
        clock.advance(Duration::milliseconds(50));

        let removed = map.sweep();
        assert_eq!(removed, 1);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn given_missing_key_when_get_then_none() {
        let map = TtlMap::new(Duration::hours(1));
        assert_eq!(map.get("missing"), None);
    }
}
