//! Access to the telemetry store.
//!
//! The service only ever sees flat query results through these traits; the
//! relational engine behind them owns isolation and consistency.

pub mod postgres;

#[cfg(test)]
pub mod memory;

use anyhow::Result;
use grid_client::{
    db::WriteError,
    domain::{
        Consumer, ConsumerReading, EntityFilter, GoalType, NewReport, Report, Scope, Suburb,
        TelemetryKind, TelemetrySample, TypedGenerationSample, WarningType,
    },
};
use time::OffsetDateTime;

pub use postgres::PgStore;

#[async_trait::async_trait]
pub trait TelemetryWriter: Send + Sync {
    /// Write exactly one sample; conflicts are reported, never overwritten.
    async fn insert_sample(
        &self,
        kind: TelemetryKind,
        sample: &TelemetrySample,
        ingested_at: OffsetDateTime,
    ) -> Result<(), WriteError>;
}

#[async_trait::async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Samples with `start < date <= end`, ascending.
    async fn samples(
        &self,
        kind: TelemetryKind,
        start: OffsetDateTime,
        end: OffsetDateTime,
        filter: &EntityFilter,
    ) -> Result<Vec<TelemetrySample>>;

    /// Most recent sample strictly before `before`.
    async fn latest_before(
        &self,
        kind: TelemetryKind,
        before: OffsetDateTime,
        filter: &EntityFilter,
    ) -> Result<Option<TelemetrySample>>;

    async fn consumer_readings(&self, scope: Scope) -> Result<Vec<ConsumerReading>>;

    async fn typed_generation(
        &self,
        start: OffsetDateTime,
        end: OffsetDateTime,
        suburb_id: Option<i32>,
    ) -> Result<Vec<TypedGenerationSample>>;

    async fn generator_ids(&self, suburb_id: Option<i32>) -> Result<Vec<i32>>;

    async fn suburb(&self, id: i32) -> Result<Option<Suburb>>;

    async fn consumer(&self, id: i32) -> Result<Option<Consumer>>;

    async fn warning_types(&self) -> Result<Vec<WarningType>>;

    async fn goal_type(&self, id: i32) -> Result<Option<GoalType>>;

    async fn create_report(&self, report: &NewReport) -> Result<Report>;

    async fn report(&self, id: i32) -> Result<Option<Report>>;

    async fn reports(&self) -> Result<Vec<Report>>;
}
