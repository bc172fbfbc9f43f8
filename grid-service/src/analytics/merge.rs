use std::collections::BTreeMap;

use time::OffsetDateTime;

use super::aggregate::Bucket;

/// Align two series bucketed at the same granularity and combine them.
///
/// The result covers the union of both series' timestamps, ascending. Where a
/// series has no bucket at a timestamp, its last value strictly before that
/// timestamp is carried forward; `seed_a`/`seed_b` stand in for values before
/// the first bucket. Timestamps where either side still has no value are
/// skipped. For merged buckets `average` and `amount` both hold the combined
/// value.
pub fn merge<F>(
    a: &[Bucket],
    b: &[Bucket],
    seed_a: Option<f64>,
    seed_b: Option<f64>,
    combine: F,
) -> Vec<Bucket>
where
    F: Fn(f64, f64) -> f64,
{
    let Some(granularity) = a.first().or(b.first()).map(|bucket| bucket.granularity) else {
        return Vec::new();
    };

    let mut aligned: BTreeMap<OffsetDateTime, (Option<f64>, Option<f64>)> = BTreeMap::new();
    for bucket in a {
        aligned.entry(bucket.start).or_default().0 = Some(bucket.amount);
    }
    for bucket in b {
        aligned.entry(bucket.start).or_default().1 = Some(bucket.amount);
    }

    let mut last_a = seed_a;
    let mut last_b = seed_b;
    let mut merged = Vec::with_capacity(aligned.len());

    for (start, (value_a, value_b)) in aligned {
        last_a = value_a.or(last_a);
        last_b = value_b.or(last_b);

        let (Some(x), Some(y)) = (last_a, last_b) else {
            continue;
        };
        let value = combine(x, y);
        merged.push(Bucket {
            start,
            granularity,
            average: value,
            amount: value,
        });
    }

    merged
}
