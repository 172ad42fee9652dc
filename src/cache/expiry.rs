//! Expiry Module
//!
//! Absolute expiry deadlines and the time arithmetic around them.

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::{CacheError, Result};

// == Deadline ==
/// Computes the absolute deadline `seconds` from `now`.
///
/// Negative offsets are allowed and yield a deadline in the past.
pub fn deadline_after(now: DateTime<Utc>, seconds: i64) -> Result<DateTime<Utc>> {
    TimeDelta::try_seconds(seconds)
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or_else(|| CacheError::InvalidArgument("invalid expire time".to_string()))
}

// == Is Expired ==
/// Checks if a deadline has passed.
///
/// A key is expired only once `now` is strictly later than its deadline.
pub fn is_expired(deadline: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now > deadline
}

// == Remaining Seconds ==
/// Returns the whole seconds left until `deadline`, floored.
pub fn remaining_secs(deadline: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (deadline - now).num_milliseconds();
    millis.div_euclid(1000)
}
