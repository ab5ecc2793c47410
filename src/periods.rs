/// Leaderboard time bucketing
///
/// This module maps a completion timestamp to the period keys used to
/// address leaderboard counter documents. Every completion lands in three
/// buckets at once: the calendar day, the ISO-8601 week, and the calendar
/// month of the completion instant.
///
/// All bucketing is done in UTC. Mixing zones would let the same instant
/// land in different buckets depending on the caller, so the crate fixes
/// UTC everywhere a key is derived.
///
/// # Week Numbering
///
/// Week keys use ISO-8601 week-numbering years, not calendar years. The
/// last days of December can belong to week 1 of the following year and
/// the first days of January to the last week of the prior year:
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use taskrank::periods::week_key;
///
/// let t = Utc.with_ymd_and_hms(2024, 12, 30, 12, 0, 0).unwrap();
/// assert_eq!(week_key(t), "2025-W1");
/// ```

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bucketing resolution for leaderboard counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// One counter document per calendar day
    Day,

    /// One counter document per ISO-8601 week
    Week,

    /// One counter document per calendar month
    Month,
}

impl Granularity {
    /// All granularities, in the order counters are updated
    pub const ALL: [Granularity; 3] = [Granularity::Day, Granularity::Week, Granularity::Month];

    /// Converts granularity to its wire string
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
        }
    }

    /// Derives the period key for `at` under this granularity
    pub fn period_key(&self, at: DateTime<Utc>) -> String {
        match self {
            Granularity::Day => day_key(at),
            Granularity::Week => week_key(at),
            Granularity::Month => month_key(at),
        }
    }

    /// Derives the counter document id for `at` under this granularity
    ///
    /// Ids follow the `leaderboard-{granularity}-{periodKey}` naming of the
    /// deployed document layout, e.g. `leaderboard-week-2025-W1`.
    pub fn counter_doc_id(&self, at: DateTime<Utc>) -> String {
        format!("leaderboard-{}-{}", self.as_str(), self.period_key(at))
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Calendar-day period key, e.g. `2024-3-7`
///
/// Components are unpadded, matching the deployed document ids.
pub fn day_key(at: DateTime<Utc>) -> String {
    let d = at.date_naive();
    format!("{}-{}-{}", d.year(), d.month(), d.day())
}

/// ISO-8601 week period key, e.g. `2025-W1`
///
/// The year component is the ISO week-numbering year, which differs from
/// the calendar year around New Year.
pub fn week_key(at: DateTime<Utc>) -> String {
    let iso = at.date_naive().iso_week();
    format!("{}-W{}", iso.year(), iso.week())
}

/// Calendar-month period key, e.g. `2024-3`
pub fn month_key(at: DateTime<Utc>) -> String {
    let d = at.date_naive();
    format!("{}-{}", d.year(), d.month())
}

/// ISO calendar date of `at`, e.g. `2024-03-07`
///
/// Stored on counter documents as a diagnostic of when they were last
/// touched.
pub fn iso_date(at: DateTime<Utc>) -> String {
    at.date_naive().to_string()
}
