//! Daily usage limits.

use chrono::{NaiveDate, Utc};

use dashmap::DashMap;

use packrat_model::UserId;

/// Per-user usage counters that reset at the UTC day boundary.
///
/// The window is the calendar day, not the 24 hours since the last use.
#[derive(Debug, Default)]
pub struct UsageLimiter {
    usage: DashMap<UserId, Usage>,
}

#[derive(Clone, Copy, Debug)]
struct Usage {
    day: NaiveDate,
    count: u32,
}

impl UsageLimiter {
    /// Creates a limiter with no recorded usage.
    pub fn new() -> UsageLimiter {
        UsageLimiter::default()
    }

    /// Consumes one use for `user_id` today, if any remain.
    ///
    /// Returns `false` without recording anything once `limit` uses have
    /// been made in the current UTC day.
    pub fn check_and_consume(&self, user_id: UserId, limit: u32) -> bool {
        self.check_and_consume_on(user_id, limit, Utc::now().date_naive())
    }

    /// Like [`UsageLimiter::check_and_consume`], on a given day.
    pub fn check_and_consume_on(&self, user_id: UserId, limit: u32, day: NaiveDate) -> bool {
        // the entry guard holds the shard lock, so the whole check is atomic
        // for this user
        let mut usage = self.usage.entry(user_id).or_insert(Usage { day, count: 0 });

        if usage.day < day {
            usage.day = day;
            usage.count = 0;
        }

        if usage.count >= limit {
            tracing::debug!(%user_id, limit, "usage limit reached");
            return false;
        }

        usage.count += 1;
        true
    }

    /// How many uses `user_id` has made on `day`.
    pub fn used_on(&self, user_id: UserId, day: NaiveDate) -> u32 {
        self.usage
            .get(&user_id)
            .filter(|usage| usage.day == day)
            .map(|usage| usage.count)
            .unwrap_or(0)
    }

    /// Forgets a user's usage.
    pub fn forget(&self, user_id: UserId) {
        self.usage.remove(&user_id);
    }
}
