use serde::Serialize;
use time::{Duration, OffsetDateTime, UtcOffset};

/// Ranges at least this wide are bucketed weekly. Months are counted as 30 days.
pub const MONTH: Duration = Duration::days(30);
/// Ranges at least this wide (and under a month) are bucketed daily.
pub const WEEK: Duration = Duration::weeks(1);

const SECS_PER_HOUR: i64 = 3_600;
const SECS_PER_DAY: i64 = 86_400;
const SECS_PER_WEEK: i64 = 604_800;
// 1970-01-05 was the first Monday after the epoch.
const FIRST_MONDAY: i64 = 4 * SECS_PER_DAY;

/// Width of the buckets a request is aggregated into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hourly,
    Daily,
    Weekly,
}

impl Granularity {
    /// Pick the bucket width for a query range.
    pub fn for_range(start: OffsetDateTime, end: OffsetDateTime) -> Self {
        let width = end - start;
        if width >= MONTH {
            Self::Weekly
        } else if width >= WEEK {
            Self::Daily
        } else {
            Self::Hourly
        }
    }

    /// Bucket duration in hours; multiplies an average power (kW) into energy (kWh).
    pub fn hours(self) -> f64 {
        match self {
            Self::Hourly => 1.0,
            Self::Daily => 24.0,
            Self::Weekly => 168.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
        }
    }

    /// Start (UTC) of the bucket containing `ts`. Weeks start on Monday.
    pub fn truncate(self, ts: OffsetDateTime) -> OffsetDateTime {
        let utc = ts.to_offset(UtcOffset::UTC);
        let secs = utc.unix_timestamp();
        let into_bucket = match self {
            Self::Hourly => secs.rem_euclid(SECS_PER_HOUR),
            Self::Daily => secs.rem_euclid(SECS_PER_DAY),
            Self::Weekly => (secs - FIRST_MONDAY).rem_euclid(SECS_PER_WEEK),
        };

        utc - Duration::seconds(into_bucket) - Duration::nanoseconds(i64::from(utc.nanosecond()))
    }
}
