//! Daily usage ledger
//!
//! Gates natural-language requests behind two independent counters: a
//! global daily cap and a per-requester daily cap. Direct placements are
//! never charged. Only the current day's counts are retained; stale days
//! are pruned whenever the ledger rolls forward.

mod store;

pub use store::{load_ledger, save_ledger};

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Caps applied by [`UsageLedger::check`].
#[derive(Debug, Clone)]
pub struct QuotaPolicy {
    /// Requests allowed per day across all requesters.
    pub daily_cap: u32,
    /// Requests allowed per day for one requester.
    pub per_user_cap: u32,
    /// Requesters exempt from the per-user cap. The global cap still
    /// applies to them.
    pub exempt: HashSet<String>,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            daily_cap: 40,
            per_user_cap: 5,
            exempt: HashSet::new(),
        }
    }
}

/// Outcome of a quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaCheck {
    Allowed,
    /// The global daily cap is reached.
    DailyLimitExceeded,
    /// The requester's own daily cap is reached.
    UserLimitExceeded,
}

/// Request counts for a single calendar day (UTC).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageLedger {
    day: NaiveDate,
    counts: HashMap<String, u32>,
}

impl UsageLedger {
    /// An empty ledger for `day`.
    pub fn for_day(day: NaiveDate) -> Self {
        Self {
            day,
            counts: HashMap::new(),
        }
    }

    pub fn day(&self) -> NaiveDate {
        self.day
    }

    /// Total requests recorded today, across all requesters.
    pub fn total(&self) -> u32 {
        self.counts.values().sum()
    }

    /// Requests recorded today for one requester.
    pub fn count_for(&self, requester: &str) -> u32 {
        self.counts.get(requester).copied().unwrap_or(0)
    }

    /// Evaluate both quota tiers for a request arriving on `day`.
    ///
    /// Must run before any model call: quota refusals fail fast and never
    /// reach the orchestrator. Counts held for a prior day read as zero.
    pub fn check(&self, day: NaiveDate, requester: &str, policy: &QuotaPolicy) -> QuotaCheck {
        let (total, own) = if self.day == day {
            (self.total(), self.count_for(requester))
        } else {
            (0, 0)
        };

        if total >= policy.daily_cap {
            return QuotaCheck::DailyLimitExceeded;
        }
        if !policy.exempt.contains(requester) && own >= policy.per_user_cap {
            return QuotaCheck::UserLimitExceeded;
        }
        QuotaCheck::Allowed
    }

    /// Charge one request to `requester` on `day`.
    ///
    /// Called only after a request is fully applied: refused, invalid, and
    /// failed requests consume no quota. Rolling to a new day discards the
    /// prior day's counts.
    pub fn record(&mut self, day: NaiveDate, requester: &str) {
        if self.day != day {
            self.day = day;
            self.counts.clear();
        }
        *self.counts.entry(requester.to_string()).or_insert(0) += 1;
    }
}
