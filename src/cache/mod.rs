//! Bounded TTL map used for short-lived auth bookkeeping.
//!
//! Holds consumed authorization codes, issued OAuth `state` nonces and
//! browser sessions. Expiry is evaluated on access against a caller-supplied
//! clock, so entries vanish on time even if no sweeper ever runs;
//! `purge_expired` only reclaims memory.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};


struct CacheEntry<V> {
    value: V,
    inserted_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.inserted_at > ttl
    }
}

/// String-keyed map whose entries expire `ttl` after insertion.
///
/// When full, an insert first drops expired entries and then evicts the
/// oldest live entry.
pub struct ExpiringCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    ttl: Duration,
    capacity: usize,
}

impl<V: Clone> ExpiringCache<V> {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.insert_at(key, value, Utc::now());
    }

    pub fn insert_at(&self, key: impl Into<String>, value: V, now: DateTime<Utc>) {
        let key = key.into();
        let mut entries = self.lock();
        self.make_room(&mut entries, &key, now);
        entries.insert(key, CacheEntry { value, inserted_at: now });
    }

    /// Inserts only if no live entry exists for `key`.
    ///
    /// Returns true when the value was inserted. Check and insert happen
    /// under one lock, so two racing callers cannot both win.
    pub fn insert_if_absent(&self, key: impl Into<String>, value: V) -> bool {
        self.insert_if_absent_at(key, value, Utc::now())
    }

    pub fn insert_if_absent_at(
        &self,
        key: impl Into<String>,
        value: V,
        now: DateTime<Utc>,
    ) -> bool {
        let key = key.into();
        let mut entries = self.lock();

        if let Some(existing) = entries.get(&key) {
            if !existing.is_expired(now, self.ttl) {
                return false;
            }
        }

        self.make_room(&mut entries, &key, now);
        entries.insert(key, CacheEntry { value, inserted_at: now });
        true
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, Utc::now())
    }

    pub fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<V> {
        let mut entries = self.lock();
        let expired = entries.get(key)?.is_expired(now, self.ttl);
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.contains_at(key, Utc::now())
    }

    pub fn contains_at(&self, key: &str, now: DateTime<Utc>) -> bool {
        self.get_at(key, now).is_some()
    }

    /// Removes the entry and returns it if it was still live.
    pub fn take(&self, key: &str) -> Option<V> {
        self.take_at(key, Utc::now())
    }

    pub fn take_at(&self, key: &str, now: DateTime<Utc>) -> Option<V> {
        let entry = self.lock().remove(key)?;
        if entry.is_expired(now, self.ttl) {
            return None;
        }
        Some(entry.value)
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.lock().remove(key).map(|entry| entry.value)
    }

    /// Keeps only entries whose value satisfies `keep`. Returns how many were dropped.
    pub fn retain(&self, mut keep: impl FnMut(&V) -> bool) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| keep(&entry.value));
        before - entries.len()
    }

    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now, self.ttl));
        before - entries.len()
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn make_room(
        &self,
        entries: &mut HashMap<String, CacheEntry<V>>,
        key: &str,
        now: DateTime<Utc>,
    ) {
        if entries.contains_key(key) || entries.len() < self.capacity {
            return;
        }

        entries.retain(|_, entry| !entry.is_expired(now, self.ttl));
        if entries.len() < self.capacity {
            return;
        }

        let oldest = entries
            .iter()
            .min_by_key(|(_, entry)| entry.inserted_at)
            .map(|(k, _)| k.clone());
        if let Some(oldest) = oldest {
            entries.remove(&oldest);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
