//! Cache Store Module
//!
//! Main cache engine: a value map, a parallel expiry table and the
//! insertion order that drives eviction and `KEYS` output.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::cache::{expiry, EvictionPolicy, InsertionOrder};
use crate::error::Result;

/// TTL reply for a key that does not exist
pub const TTL_MISSING: i64 = -2;

/// TTL reply for a key without an expiry
pub const TTL_PERSISTENT: i64 = -1;

// == Cache Store ==
/// Authoritative key/value state with lazy expiry.
///
/// Every key in `expiries` is also in `values`; deleting, evicting or
/// purging a key removes it from both maps and from `order`.
#[derive(Debug)]
pub struct CacheStore {
    /// Key-value storage
    values: HashMap<String, String>,
    /// Absolute expiry deadline per key
    expiries: HashMap<String, DateTime<Utc>>,
    /// Insertion order of live keys
    order: InsertionOrder,
    /// Maximum number of keys, None = unbounded
    capacity: Option<usize>,
    /// Rule applied when `capacity` is reached
    policy: EvictionPolicy,
    /// Keys removed by expiry since the last `take_purged`
    purged: Vec<String>,
}

impl CacheStore {
    // == Constructor ==
    /// Creates an empty store.
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of keys, None for unbounded
    /// * `policy` - Eviction rule consulted when the capacity is reached
    pub fn new(capacity: Option<usize>, policy: EvictionPolicy) -> Self {
        Self {
            values: HashMap::new(),
            expiries: HashMap::new(),
            order: InsertionOrder::new(),
            capacity,
            policy,
            purged: Vec::new(),
        }
    }

    /// Creates an unbounded store that never evicts.
    pub fn unbounded() -> Self {
        Self::new(None, EvictionPolicy::NoEviction)
    }

    // == Set ==
    /// Inserts or overwrites a key and clears any expiry it had.
    ///
    /// Inserting a new key into a full store evicts at most one key first,
    /// as chosen by the eviction policy. Overwriting keeps the key's
    /// position in insertion order and never evicts, even when the store
    /// is full: the key count does not grow, so no slot has to be freed.
    ///
    /// Returns the evicted key, if any.
    pub fn set(&mut self, key: String, value: String) -> Option<String> {
        let evicted = if self.values.contains_key(&key) {
            None
        } else {
            let evicted = self.evict_if_full();
            self.order.record(&key);
            evicted
        };

        self.expiries.remove(&key);
        self.values.insert(key, value);

        evicted
    }

    // == Get ==
    /// Retrieves a value, purging the key first if it has expired.
    pub fn get(&mut self, key: &str) -> Option<String> {
        self.get_at(key, Utc::now())
    }

    pub(crate) fn get_at(&mut self, key: &str, now: DateTime<Utc>) -> Option<String> {
        if self.purge_if_expired(key, now) {
            return None;
        }
        self.values.get(key).cloned()
    }

    // == Delete ==
    /// Removes a key and its expiry. Deleting a missing key is a no-op.
    ///
    /// Returns whether the key was present.
    pub fn delete(&mut self, key: &str) -> bool {
        self.expiries.remove(key);
        self.order.remove(key);
        self.values.remove(key).is_some()
    }

    // == Exists ==
    /// Checks for a key with the same lazy-expiry rule as `get`.
    pub fn exists(&mut self, key: &str) -> bool {
        self.exists_at(key, Utc::now())
    }

    pub(crate) fn exists_at(&mut self, key: &str, now: DateTime<Utc>) -> bool {
        !self.purge_if_expired(key, now) && self.values.contains_key(key)
    }

    // == Expire ==
    /// Sets the key to expire `seconds` from now.
    ///
    /// Returns false, with no effect, if the key does not exist. A key whose
    /// deadline already passed counts as missing and is purged.
    pub fn expire(&mut self, key: &str, seconds: i64) -> Result<bool> {
        self.expire_at(key, seconds, Utc::now())
    }

    pub(crate) fn expire_at(&mut self, key: &str, seconds: i64, now: DateTime<Utc>) -> Result<bool> {
        let deadline = expiry::deadline_after(now, seconds)?;
        if self.purge_if_expired(key, now) || !self.values.contains_key(key) {
            return Ok(false);
        }
        self.expiries.insert(key.to_string(), deadline);
        Ok(true)
    }

    // == Time To Live ==
    /// Returns `-2` for a missing (or just expired) key, `-1` for a key
    /// without expiry, otherwise the whole seconds remaining.
    pub fn ttl(&mut self, key: &str) -> i64 {
        self.ttl_at(key, Utc::now())
    }

    pub(crate) fn ttl_at(&mut self, key: &str, now: DateTime<Utc>) -> i64 {
        if self.purge_if_expired(key, now) || !self.values.contains_key(key) {
            return TTL_MISSING;
        }
        match self.expiries.get(key) {
            Some(deadline) => expiry::remaining_secs(*deadline, now).max(TTL_MISSING),
            None => TTL_PERSISTENT,
        }
    }

    // == Keys ==
    /// Lists every tracked key in insertion order.
    ///
    /// Expired keys that have not been read since expiring are still listed.
    pub fn keys(&self) -> Vec<String> {
        self.order.iter().cloned().collect()
    }

    // == Purge Expired ==
    /// Removes every expired key. Returns the number removed.
    ///
    /// Removed keys are also queued for `take_purged`.
    pub fn purge_expired(&mut self) -> usize {
        let now = Utc::now();
        let expired: Vec<String> = self
            .expiries
            .iter()
            .filter(|(_, deadline)| expiry::is_expired(**deadline, now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.delete(key);
        }
        let removed = expired.len();
        self.purged.extend(expired);
        removed
    }

    /// Drains the keys removed by expiry (lazy or swept) since the last call.
    ///
    /// Eviction and `delete` are not reported here.
    pub fn take_purged(&mut self) -> Vec<String> {
        std::mem::take(&mut self.purged)
    }

    // == Raw Access ==
    /// Iterates `(key, value, expiry)` in insertion order without expiry checks.
    pub fn entries(&self) -> impl Iterator<Item = (&String, &String, Option<DateTime<Utc>>)> {
        self.order.iter().filter_map(move |key| {
            self.values
                .get(key)
                .map(|value| (key, value, self.expiries.get(key).copied()))
        })
    }

    /// Inserts an entry exactly as persisted, bypassing eviction.
    pub fn restore_entry(&mut self, key: String, value: String, expires_at: Option<DateTime<Utc>>) {
        self.order.record(&key);
        match expires_at {
            Some(deadline) => {
                self.expiries.insert(key.clone(), deadline);
            }
            None => {
                self.expiries.remove(&key);
            }
        }
        self.values.insert(key, value);
    }

    /// Drops all state.
    pub fn clear(&mut self) {
        self.values.clear();
        self.expiries.clear();
        self.order = InsertionOrder::new();
        self.purged.clear();
    }

    // == Length ==
    /// Returns the current number of keys, expired or not.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn evict_if_full(&mut self) -> Option<String> {
        let capacity = self.capacity?;
        if self.values.len() < capacity {
            return None;
        }
        let victim = self.policy.select_victim(&self.order)?.clone();
        self.delete(&victim);
        debug!(key = %victim, policy = %self.policy, "evicted key at capacity {}", capacity);
        Some(victim)
    }

    /// Removes `key` if its deadline has passed. Returns true if it did.
    fn purge_if_expired(&mut self, key: &str, now: DateTime<Utc>) -> bool {
        let expired = self
            .expiries
            .get(key)
            .is_some_and(|deadline| expiry::is_expired(*deadline, now));
        if expired {
            self.delete(key);
            self.purged.push(key.to_string());
            debug!(key, "purged expired key");
        }
        expired
    }
}
