//! Eviction Policy Module
//!
//! Decides which key to drop when the store is at capacity.

use std::fmt;
use std::str::FromStr;

use crate::cache::InsertionOrder;

// == Eviction Policy ==
/// Rule applied before inserting a new key into a full store.
///
/// `Lru` and `AllKeysLru` evict by insertion order, not by access recency:
/// reads never refresh a key's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Capacity is not enforced
    #[default]
    NoEviction,
    /// Evict the earliest inserted key
    Lru,
    /// Same rule as `Lru`, accepted under the Redis name
    AllKeysLru,
}

impl EvictionPolicy {
    // == Select Victim ==
    /// Picks the key to evict, or None when this policy never evicts.
    pub fn select_victim<'a>(&self, order: &'a InsertionOrder) -> Option<&'a String> {
        match self {
            EvictionPolicy::NoEviction => None,
            EvictionPolicy::Lru | EvictionPolicy::AllKeysLru => order.oldest(),
        }
    }
}

impl FromStr for EvictionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "noeviction" | "no-eviction" | "none" => Ok(EvictionPolicy::NoEviction),
            "lru" => Ok(EvictionPolicy::Lru),
            "allkeys-lru" | "all-keys-lru" => Ok(EvictionPolicy::AllKeysLru),
            other => Err(format!("unknown eviction policy '{}'", other)),
        }
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EvictionPolicy::NoEviction => "noeviction",
            EvictionPolicy::Lru => "lru",
            EvictionPolicy::AllKeysLru => "allkeys-lru",
        };
        f.write_str(name)
    }
}
