use std::collections::BTreeMap;

use anyhow::Result;
use grid_client::domain::{EntityFilter, TelemetryKind, TelemetrySample};
use serde::Serialize;
use time::OffsetDateTime;

use super::granularity::Granularity;
use crate::store::TelemetryStore;

/// One time bucket of a series.
///
/// Serialises as `{date, amount}`, the shape the presentation layer charts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket {
    #[serde(rename = "date", with = "time::serde::rfc3339")]
    pub start: OffsetDateTime,
    #[serde(skip)]
    pub granularity: Granularity,
    /// Arithmetic mean of the raw samples in the bucket.
    #[serde(skip)]
    pub average: f64,
    /// Energy (kWh) for power series, the average itself for price series.
    pub amount: f64,
}

/// How a bucket average turns into the reported amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// Average power (kW) held over the whole bucket, reported as kWh.
    Energy,
    /// Reported as is (prices).
    Average,
}

impl Conversion {
    pub fn for_kind(kind: TelemetryKind) -> Self {
        if kind.is_price() {
            Self::Average
        } else {
            Self::Energy
        }
    }

    pub fn apply(self, average: f64, granularity: Granularity) -> f64 {
        match self {
            Self::Energy => average * granularity.hours(),
            Self::Average => average,
        }
    }
}

/// Group samples with `start < date <= end` into buckets, ascending.
pub fn bucket_samples(
    samples: &[TelemetrySample],
    start: OffsetDateTime,
    end: OffsetDateTime,
    granularity: Granularity,
    conversion: Conversion,
) -> Vec<Bucket> {
    let mut sums: BTreeMap<OffsetDateTime, (f64, u32)> = BTreeMap::new();

    for s in samples.iter().filter(|s| s.date > start && s.date <= end) {
        let entry = sums.entry(granularity.truncate(s.date)).or_insert((0.0, 0));
        entry.0 += s.amount;
        entry.1 += 1;
    }

    sums.into_iter()
        .map(|(bucket_start, (sum, count))| {
            let average = sum / f64::from(count);
            Bucket {
                start: bucket_start,
                granularity,
                average,
                amount: conversion.apply(average, granularity),
            }
        })
        .collect()
}

/// Aggregate one series over `(start, end]` at the granularity the range implies.
pub async fn aggregate<S>(
    store: &S,
    kind: TelemetryKind,
    start: OffsetDateTime,
    end: OffsetDateTime,
    filter: &EntityFilter,
) -> Result<Vec<Bucket>>
where
    S: TelemetryStore + ?Sized,
{
    if filter.is_empty() {
        return Ok(Vec::new());
    }

    let granularity = Granularity::for_range(start, end);
    let samples = store.samples(kind, start, end, filter).await?;

    tracing::debug!(
        kind = ?kind,
        granularity = granularity.as_str(),
        samples = samples.len(),
        "aggregating series"
    );

    Ok(bucket_samples(&samples, start, end, granularity, Conversion::for_kind(kind)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{self, MemoryStore};
    use time::macros::datetime;
    use time::Duration;

    fn sample(date: OffsetDateTime, amount: f64) -> TelemetrySample {
        TelemetrySample {
            entity_id: Some(1),
            date,
            amount,
        }
    }

    #[test]
    fn hourly_bucket_average_becomes_kwh() {
        let start = datetime!(2024-03-01 00:00:00 UTC);
        let end = datetime!(2024-03-01 06:00:00 UTC);
        let samples = vec![
            sample(datetime!(2024-03-01 02:05:00 UTC), 100.0),
            sample(datetime!(2024-03-01 02:25:00 UTC), 200.0),
            sample(datetime!(2024-03-01 02:55:00 UTC), 300.0),
        ];

        let buckets = bucket_samples(&samples, start, end, Granularity::Hourly, Conversion::Energy);

        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].start, datetime!(2024-03-01 02:00:00 UTC));
        assert_eq!(buckets[0].average, 200.0);
        assert_eq!(buckets[0].amount, 200.0);
    }

    #[test]
    fn daily_and_weekly_multipliers() {
        let start = datetime!(2024-01-01 00:00:00 UTC);
        let end = datetime!(2024-03-01 00:00:00 UTC);
        let samples = vec![
            sample(datetime!(2024-01-10 01:00:00 UTC), 10.0),
            sample(datetime!(2024-01-10 23:00:00 UTC), 30.0),
        ];

        let daily = bucket_samples(&samples, start, end, Granularity::Daily, Conversion::Energy);
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].amount, 480.0);

        let weekly = bucket_samples(&samples, start, end, Granularity::Weekly, Conversion::Energy);
        assert_eq!(weekly.len(), 1);
        assert_eq!(weekly[0].start, datetime!(2024-01-08 00:00:00 UTC));
        assert_eq!(weekly[0].amount, 20.0 * 168.0);
    }

    #[test]
    fn sample_at_end_is_included() {
        let start = datetime!(2024-03-01 00:00:00 UTC);
        let end = datetime!(2024-03-01 03:00:00 UTC);
        let samples = vec![sample(end, 50.0)];

        let buckets = bucket_samples(&samples, start, end, Granularity::Hourly, Conversion::Energy);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].start, end);
    }

    #[test]
    fn sample_at_start_is_excluded() {
        let start = datetime!(2024-03-01 00:00:00 UTC);
        let end = datetime!(2024-03-01 03:00:00 UTC);
        let samples = vec![sample(start, 50.0)];

        let buckets = bucket_samples(&samples, start, end, Granularity::Hourly, Conversion::Energy);
        assert!(buckets.is_empty());
    }

    #[test]
    fn buckets_come_out_ascending_and_prices_are_not_converted() {
        let start = datetime!(2024-03-01 00:00:00 UTC);
        let end = datetime!(2024-03-01 05:00:00 UTC);
        let samples = vec![
            sample(datetime!(2024-03-01 04:10:00 UTC), 0.40),
            sample(datetime!(2024-03-01 01:10:00 UTC), 0.20),
            sample(datetime!(2024-03-01 01:40:00 UTC), 0.30),
        ];

        let buckets = bucket_samples(&samples, start, end, Granularity::Hourly, Conversion::Average);
        let starts: Vec<_> = buckets.iter().map(|b| b.start).collect();
        assert_eq!(
            starts,
            vec![datetime!(2024-03-01 01:00:00 UTC), datetime!(2024-03-01 04:00:00 UTC)]
        );
        assert!((buckets[0].amount - 0.25).abs() < 1e-12);
        assert!((buckets[1].amount - 0.40).abs() < 1e-12);
    }

    #[test]
    fn serialises_as_date_and_amount() {
        let bucket = Bucket {
            start: datetime!(2024-03-01 02:00:00 UTC),
            granularity: Granularity::Hourly,
            average: 200.0,
            amount: 200.0,
        };
        let json = serde_json::to_value(&bucket).unwrap();
        assert_eq!(json, serde_json::json!({"date": "2024-03-01T02:00:00Z", "amount": 200.0}));
    }

    #[tokio::test]
    async fn empty_range_and_empty_entity_set_yield_empty_sequences() {
        let store = MemoryStore::default();
        store.add_suburb(memory::suburb(1));
        let start = datetime!(2024-03-01 00:00:00 UTC);
        let end = start + Duration::hours(6);
        store.push_sample(TelemetryKind::SuburbConsumption, Some(1), start + Duration::hours(1), 10.0);

        let none = aggregate(&store, TelemetryKind::SuburbConsumption, start, end, &EntityFilter::Ids(vec![]))
            .await
            .unwrap();
        assert!(none.is_empty());

        let later = aggregate(
            &store,
            TelemetryKind::SuburbConsumption,
            end,
            end + Duration::hours(2),
            &EntityFilter::All,
        )
        .await
        .unwrap();
        assert!(later.is_empty());

        let some = aggregate(&store, TelemetryKind::SuburbConsumption, start, end, &EntityFilter::single(1))
            .await
            .unwrap();
        assert_eq!(some.len(), 1);
        assert_eq!(some[0].amount, 10.0);
    }
}
