//! Item module - one candidate for removal, and the staleness rule

use chrono::{DateTime, TimeDelta, Utc};
use std::fmt;
use std::time::Duration;

/// A resource that may be removed once it is old enough
///
/// The `id` is opaque and only meaningful to the provider that produced it;
/// ids from different providers are never compared. Items are immutable once
/// listed and carry no identity beyond the pass that listed them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Item {
    /// Provider-defined identifier
    pub id: String,

    /// Point in time the item's age is measured from
    pub age: DateTime<Utc>,
}

impl Item {
    /// Create a new item
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::Utc;
    /// use staler_domain::Item;
    ///
    /// let item = Item::new("abc123", Utc::now());
    /// assert_eq!(item.to_string(), "abc123");
    /// ```
    pub fn new(id: impl Into<String>, age: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            age,
        }
    }

    /// Create an item aged from a Unix timestamp in seconds
    ///
    /// Returns `None` when the timestamp is outside the representable range.
    pub fn at_unix(id: impl Into<String>, secs: i64) -> Option<Self> {
        DateTime::from_timestamp(secs, 0).map(|age| Self::new(id, age))
    }

    /// Create an item that has never seen any activity
    ///
    /// Its age is the Unix epoch, so it is stale under any realistic expiry.
    pub fn never_active(id: impl Into<String>) -> Self {
        Self::new(id, DateTime::UNIX_EPOCH)
    }

    /// How long ago this item's age point was, relative to `now`
    pub fn elapsed(&self, now: DateTime<Utc>) -> TimeDelta {
        now.signed_duration_since(self.age)
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Decide whether `item` is stale under `expiry` at time `now`
///
/// An item is stale iff `now - item.age > expiry`. The comparison is strict:
/// an item exactly `expiry` old is kept. An expiry too large to express as a
/// signed time delta never expires anything.
///
/// # Examples
///
/// ```
/// use chrono::{TimeDelta, Utc};
/// use staler_domain::{is_stale, Item};
/// use std::time::Duration;
///
/// let now = Utc::now();
/// let month = Duration::from_secs(30 * 86400);
///
/// let old = Item::new("old", now - TimeDelta::days(45));
/// let fresh = Item::new("fresh", now - TimeDelta::days(10));
///
/// assert!(is_stale(&old, month, now));
/// assert!(!is_stale(&fresh, month, now));
/// ```
pub fn is_stale(item: &Item, expiry: Duration, now: DateTime<Utc>) -> bool {
    match TimeDelta::from_std(expiry) {
        Ok(expiry) => item.elapsed(now) > expiry,
        Err(_) => false,
    }
}
