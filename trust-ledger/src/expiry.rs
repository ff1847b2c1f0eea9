//! Lazy expiry
//!
//! There is no background scheduler. Anything that lapses with time
//! implements [`Expiring`], and every read path calls [`refresh`] before
//! looking at the record, so all accessors agree on what is still active.

use chrono::{DateTime, Duration, Utc};

/// A record carrying clock-driven state
pub trait Expiring {
    /// Drop whatever has lapsed at `now`. Returns `true` if anything changed.
    fn expire(&mut self, now: DateTime<Utc>) -> bool;
}

/// Single expiry predicate: a deadline has passed once `now >= deadline`
pub fn elapsed(deadline: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now >= deadline
}

/// Same as [`elapsed`] for optional deadlines; `None` never lapses
pub fn elapsed_opt(deadline: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    deadline.map_or(false, |d| elapsed(d, now))
}

/// Started at `start` and not yet lapsed at `deadline`
pub fn within(start: DateTime<Utc>, deadline: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    start <= now && !elapsed(deadline, now)
}

/// `now + secs`, or `None` when the offset is negative or out of range
pub fn deadline_after_secs(now: DateTime<Utc>, secs: i64) -> Option<DateTime<Utc>> {
    if secs < 0 {
        return None;
    }
    Duration::try_seconds(secs).and_then(|d| now.checked_add_signed(d))
}

/// Apply expiry to a record before it is read
pub fn refresh<T: Expiring>(record: &mut T, now: DateTime<Utc>) -> bool {
    let changed = record.expire(now);
    if changed {
        tracing::debug!(at = %now, "expired state cleared on read");
    }
    changed
}
