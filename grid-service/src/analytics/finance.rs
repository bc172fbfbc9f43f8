use grid_client::domain::{EntityFilter, Scope, TelemetryKind};

use super::{
    aggregate::{aggregate, Bucket, Conversion},
    consumption_series,
    granularity::Granularity,
    merge::merge,
};
use crate::{
    query::{DateRange, QueryError},
    store::TelemetryStore,
};

/// Selling price minus spot price per bucket.
pub async fn profit_margin<S>(store: &S, range: DateRange) -> Result<Vec<Bucket>, QueryError>
where
    S: TelemetryStore + ?Sized,
{
    let selling = aggregate(store, TelemetryKind::SellingPrice, range.start, range.end, &EntityFilter::All).await?;
    let spot = aggregate(store, TelemetryKind::SpotPrice, range.start, range.end, &EntityFilter::All).await?;

    // Checked before the seed lookups, which would otherwise scan the whole history.
    if selling.is_empty() && spot.is_empty() {
        return Ok(Vec::new());
    }

    let seed_selling = store
        .latest_before(TelemetryKind::SellingPrice, range.start, &EntityFilter::All)
        .await?
        .map(|s| s.amount);
    let seed_spot = store
        .latest_before(TelemetryKind::SpotPrice, range.start, &EntityFilter::All)
        .await?
        .map(|s| s.amount);

    Ok(merge(&selling, &spot, seed_selling, seed_spot, |sell, spot| sell - spot))
}

/// Consumed energy times selling price per bucket.
pub async fn spending<S>(store: &S, scope: Scope, range: DateRange) -> Result<Vec<Bucket>, QueryError>
where
    S: TelemetryStore + ?Sized,
{
    let (kind, filter) = consumption_series(scope);
    let granularity = Granularity::for_range(range.start, range.end);

    let consumption = aggregate(store, kind, range.start, range.end, &filter).await?;
    let price = aggregate(store, TelemetryKind::SellingPrice, range.start, range.end, &EntityFilter::All).await?;

    if consumption.is_empty() && price.is_empty() {
        return Ok(Vec::new());
    }

    let seed_consumption = store
        .latest_before(kind, range.start, &filter)
        .await?
        .map(|s| Conversion::Energy.apply(s.amount, granularity));
    let seed_price = store
        .latest_before(TelemetryKind::SellingPrice, range.start, &EntityFilter::All)
        .await?
        .map(|s| s.amount);

    Ok(merge(&consumption, &price, seed_consumption, seed_price, |kwh, price| kwh * price))
}
