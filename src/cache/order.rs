//! Key Order Module
//!
//! Tracks the order in which keys were first inserted.

use std::collections::{BTreeMap, HashMap};

// == Insertion Order ==
/// Keeps keys in insertion order.
///
/// Each key gets a monotonically increasing sequence number when first
/// recorded:
/// - `by_seq` walks keys from oldest (lowest) to newest (highest)
/// - `seq_of` finds a key's slot for removal without a scan
///
/// Re-inserting a tracked key leaves its position unchanged.
#[derive(Debug, Default, Clone)]
pub struct InsertionOrder {
    next_seq: u64,
    by_seq: BTreeMap<u64, String>,
    seq_of: HashMap<String, u64>,
}

impl InsertionOrder {
    // == Constructor ==
    /// Creates a new empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    // == Record ==
    /// Appends a key if it is not already tracked.
    pub fn record(&mut self, key: &str) {
        if self.seq_of.contains_key(key) {
            return;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.by_seq.insert(seq, key.to_string());
        self.seq_of.insert(key.to_string(), seq);
    }

    // == Remove ==
    /// Removes a key from the tracker.
    pub fn remove(&mut self, key: &str) {
        if let Some(seq) = self.seq_of.remove(key) {
            self.by_seq.remove(&seq);
        }
    }

    // == Oldest ==
    /// Returns the earliest inserted key without removing it.
    pub fn oldest(&self) -> Option<&String> {
        self.by_seq.values().next()
    }

    /// Iterates keys from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.by_seq.values()
    }

    pub fn len(&self) -> usize {
        self.by_seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_seq.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seq_of.contains_key(key)
    }
}
