//! Freshness policy for chart data.
//!
//! Chart data turns over once a day at a fixed UTC cutover. An entry is
//! *valid* while it was written after the previous cutover, and *due* once
//! today's cutover has passed without a newer write. The two predicates are
//! independent: an entry written shortly after yesterday's cutover stays
//! valid all day but becomes due the moment today's cutover is reached.
//!
//! Everything here is pure. Time comes in through [`Clock`] so both the
//! server and the client tier can be driven deterministically in tests.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::cache::CacheEntry;

/// Default daily cutover hour (UTC)
pub const DEFAULT_CUTOVER_HOUR: u32 = 23;

/// Source of the current instant
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Jump to an absolute instant
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    /// Move forward by `by`
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Calendar-boundary freshness rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    cutover: NaiveTime,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self::with_cutover_hour(DEFAULT_CUTOVER_HOUR)
    }
}

impl FreshnessPolicy {
    /// Create a policy whose daily boundary falls at `hour`:00 UTC.
    ///
    /// Hours past 23 are clamped to 23.
    pub fn with_cutover_hour(hour: u32) -> Self {
        let cutover = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
        Self { cutover }
    }

    /// The cutover on `now`'s calendar date
    pub fn cutover_instant(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.date_naive().and_time(self.cutover).and_utc()
    }

    /// The first cutover strictly after `now`
    pub fn next_cutover(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = self.cutover_instant(now);
        if now < today {
            today
        } else {
            today + Duration::days(1)
        }
    }

    /// True iff the entry was written after the cutover one day before today's
    pub fn is_valid(&self, cached_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        cached_at > self.cutover_instant(now) - Duration::days(1)
    }

    /// True iff the entry predates today's cutover and that cutover has been reached
    pub fn is_due(&self, cached_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let cutover = self.cutover_instant(now);
        cached_at < cutover && now >= cutover
    }

    /// Whether a read may be answered from `entry` without fetching
    pub fn should_serve_cache<T>(&self, entry: Option<&CacheEntry<T>>, now: DateTime<Utc>) -> bool {
        match entry {
            Some(entry) => {
                self.is_valid(entry.cached_at, now) && !self.is_due(entry.cached_at, now)
            }
            None => false,
        }
    }

    /// Side-effect free view of how the policy classifies `cached_at`.
    ///
    /// An absent entry reports invalid and due.
    pub fn status(&self, cached_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> CacheStatus {
        let next_cutover = self.next_cutover(now);
        match cached_at {
            Some(cached_at) => CacheStatus {
                cached_at: Some(cached_at),
                age_in_hours: Some((now - cached_at).num_seconds() as f64 / 3600.0),
                is_valid: self.is_valid(cached_at, now),
                is_due: self.is_due(cached_at, now),
                next_cutover,
            },
            None => CacheStatus {
                cached_at: None,
                age_in_hours: None,
                is_valid: false,
                is_due: true,
                next_cutover,
            },
        }
    }
}

/// Policy decision for one cache entry, as exposed by status endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub cached_at: Option<DateTime<Utc>>,
    pub age_in_hours: Option<f64>,
    pub is_valid: bool,
    pub is_due: bool,
    pub next_cutover: DateTime<Utc>,
}
