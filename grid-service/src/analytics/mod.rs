//! Read-only analytics over the telemetry store.
//!
//! Everything here is computed per request from current store contents; no
//! state is kept between calls.

pub mod aggregate;
pub mod finance;
pub mod granularity;
pub mod merge;
pub mod outage;
pub mod report;
pub mod sources;
pub mod warnings;

use grid_client::domain::{EntityFilter, Scope, TelemetryKind};

use crate::{
    query::{DateRange, QueryError},
    store::TelemetryStore,
};

pub use aggregate::{aggregate, Bucket};
pub use granularity::Granularity;

/// Consumption series backing a scope. Grid and suburb scopes read the
/// suburb-level series; a consumer scope reads that consumer's meter.
pub fn consumption_series(scope: Scope) -> (TelemetryKind, EntityFilter) {
    match scope {
        Scope::Grid => (TelemetryKind::SuburbConsumption, EntityFilter::All),
        Scope::Suburb(id) => (TelemetryKind::SuburbConsumption, EntityFilter::single(id)),
        Scope::Consumer(id) => (TelemetryKind::ConsumerConsumption, EntityFilter::single(id)),
    }
}

/// Generators feeding a scope. A consumer is fed by its suburb's generators.
pub async fn generation_filter<S>(store: &S, scope: Scope) -> Result<EntityFilter, QueryError>
where
    S: TelemetryStore + ?Sized,
{
    let suburb_id = match scope {
        Scope::Grid => return Ok(EntityFilter::All),
        Scope::Suburb(id) => id,
        Scope::Consumer(id) => {
            store
                .consumer(id)
                .await?
                .ok_or_else(|| QueryError::NotFound(format!("Consumer {id} not found")))?
                .suburb_id
        }
    };

    Ok(EntityFilter::Ids(store.generator_ids(Some(suburb_id)).await?))
}

pub async fn consumption<S>(store: &S, scope: Scope, range: DateRange) -> Result<Vec<Bucket>, QueryError>
where
    S: TelemetryStore + ?Sized,
{
    let (kind, filter) = consumption_series(scope);
    Ok(aggregate(store, kind, range.start, range.end, &filter).await?)
}

pub async fn generation<S>(store: &S, scope: Scope, range: DateRange) -> Result<Vec<Bucket>, QueryError>
where
    S: TelemetryStore + ?Sized,
{
    let filter = generation_filter(store, scope).await?;
    Ok(aggregate(store, TelemetryKind::GeneratorOutput, range.start, range.end, &filter).await?)
}

pub async fn prices<S>(store: &S, kind: TelemetryKind, range: DateRange) -> Result<Vec<Bucket>, QueryError>
where
    S: TelemetryStore + ?Sized,
{
    Ok(aggregate(store, kind, range.start, range.end, &EntityFilter::All).await?)
}
