use anyhow::Result;
use grid_client::{
    db::{reference_queries, report_queries, telemetry_queries, WriteError},
    domain::{
        Consumer, ConsumerReading, EntityFilter, GoalType, NewReport, Report, Scope, Suburb,
        TelemetryKind, TelemetrySample, TypedGenerationSample, WarningType,
    },
};
use sqlx::postgres::PgPool;
use time::OffsetDateTime;

use super::{TelemetryStore, TelemetryWriter};

/// Store backed by the shared Postgres pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TelemetryWriter for PgStore {
    async fn insert_sample(
        &self,
        kind: TelemetryKind,
        sample: &TelemetrySample,
        ingested_at: OffsetDateTime,
    ) -> Result<(), WriteError> {
        telemetry_queries::insert_sample(&self.pool, kind, sample, ingested_at).await
    }
}

#[async_trait::async_trait]
impl TelemetryStore for PgStore {
    async fn samples(
        &self,
        kind: TelemetryKind,
        start: OffsetDateTime,
        end: OffsetDateTime,
        filter: &EntityFilter,
    ) -> Result<Vec<TelemetrySample>> {
        telemetry_queries::samples_in_range(&self.pool, kind, start, end, filter).await
    }

    async fn latest_before(
        &self,
        kind: TelemetryKind,
        before: OffsetDateTime,
        filter: &EntityFilter,
    ) -> Result<Option<TelemetrySample>> {
        telemetry_queries::latest_before(&self.pool, kind, before, filter).await
    }

    async fn consumer_readings(&self, scope: Scope) -> Result<Vec<ConsumerReading>> {
        telemetry_queries::consumer_readings(&self.pool, scope).await
    }

    async fn typed_generation(
        &self,
        start: OffsetDateTime,
        end: OffsetDateTime,
        suburb_id: Option<i32>,
    ) -> Result<Vec<TypedGenerationSample>> {
        telemetry_queries::typed_generation(&self.pool, start, end, suburb_id).await
    }

    async fn generator_ids(&self, suburb_id: Option<i32>) -> Result<Vec<i32>> {
        reference_queries::generator_ids(&self.pool, suburb_id).await
    }

    async fn suburb(&self, id: i32) -> Result<Option<Suburb>> {
        reference_queries::suburb_by_id(&self.pool, id).await
    }

    async fn consumer(&self, id: i32) -> Result<Option<Consumer>> {
        reference_queries::consumer_by_id(&self.pool, id).await
    }

    async fn warning_types(&self) -> Result<Vec<WarningType>> {
        reference_queries::warning_types(&self.pool).await
    }

    async fn goal_type(&self, id: i32) -> Result<Option<GoalType>> {
        reference_queries::goal_type_by_id(&self.pool, id).await
    }

    async fn create_report(&self, report: &NewReport) -> Result<Report> {
        report_queries::insert_report(&self.pool, report).await
    }

    async fn report(&self, id: i32) -> Result<Option<Report>> {
        report_queries::report_by_id(&self.pool, id).await
    }

    async fn reports(&self) -> Result<Vec<Report>> {
        report_queries::list_reports(&self.pool).await
    }
}
