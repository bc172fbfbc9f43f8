use anyhow::Result;
use sqlx::{error::ErrorKind, PgPool};
use time::OffsetDateTime;

use crate::domain::{
    ConsumerReading, EntityFilter, Scope, TelemetryKind, TelemetrySample, TypedGenerationSample,
};

/// Outcome classes of a rejected telemetry insert.
#[derive(thiserror::Error, Debug)]
pub enum WriteError {
    /// The referenced entity does not exist (yet).
    #[error("foreign key violation: {0}")]
    ForeignKeyViolation(String),
    /// A sample already exists for this entity and timestamp.
    #[error("unique violation: {0}")]
    UniqueViolation(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl WriteError {
    pub fn classify(err: sqlx::Error) -> Self {
        let kind = match &err {
            sqlx::Error::Database(db) => Some(db.kind()),
            _ => None,
        };

        match kind {
            Some(ErrorKind::ForeignKeyViolation) => Self::ForeignKeyViolation(err.to_string()),
            Some(ErrorKind::UniqueViolation) => Self::UniqueViolation(err.to_string()),
            _ => Self::Database(err),
        }
    }
}

fn entity_select(kind: TelemetryKind) -> &'static str {
    match kind.entity_column() {
        Some(col) => col,
        None => "NULL::int4",
    }
}

/// Insert one sample. Duplicates are rejected by the table's primary key, never
/// overwritten.
pub async fn insert_sample(
    pool: &PgPool,
    kind: TelemetryKind,
    sample: &TelemetrySample,
    ingested_at: OffsetDateTime,
) -> Result<(), WriteError> {
    let table = kind.table();
    let res = match kind.entity_column() {
        Some(col) => {
            let sql =
                format!("INSERT INTO {table} ({col}, date, amount, ingested_at) VALUES ($1, $2, $3, $4)");
            sqlx::query(&sql)
                .bind(sample.entity_id)
                .bind(sample.date)
                .bind(sample.amount)
                .bind(ingested_at)
                .execute(pool)
                .await
        }
        None => {
            let sql = format!("INSERT INTO {table} (date, amount, ingested_at) VALUES ($1, $2, $3)");
            sqlx::query(&sql)
                .bind(sample.date)
                .bind(sample.amount)
                .bind(ingested_at)
                .execute(pool)
                .await
        }
    };

    res.map(|_| ()).map_err(WriteError::classify)
}

/// Samples of one series with `start < date <= end`, ascending by date.
pub async fn samples_in_range(
    pool: &PgPool,
    kind: TelemetryKind,
    start: OffsetDateTime,
    end: OffsetDateTime,
    filter: &EntityFilter,
) -> Result<Vec<TelemetrySample>> {
    let table = kind.table();
    let entity = entity_select(kind);

    let rows = match (kind.entity_column(), filter.ids()) {
        (Some(col), Some(ids)) => {
            let sql = format!(
                r#"
                SELECT {entity} AS entity_id, date, amount
                FROM {table}
                WHERE date > $1
                  AND date <= $2
                  AND {col} = ANY($3)
                ORDER BY date
                "#
            );
            sqlx::query_as::<_, TelemetrySample>(&sql)
                .bind(start)
                .bind(end)
                .bind(ids)
                .fetch_all(pool)
                .await?
        }
        _ => {
            let sql = format!(
                r#"
                SELECT {entity} AS entity_id, date, amount
                FROM {table}
                WHERE date > $1
                  AND date <= $2
                ORDER BY date
                "#
            );
            sqlx::query_as::<_, TelemetrySample>(&sql)
                .bind(start)
                .bind(end)
                .fetch_all(pool)
                .await?
        }
    };

    Ok(rows)
}

/// Most recent sample strictly before `before`.
pub async fn latest_before(
    pool: &PgPool,
    kind: TelemetryKind,
    before: OffsetDateTime,
    filter: &EntityFilter,
) -> Result<Option<TelemetrySample>> {
    let table = kind.table();
    let entity = entity_select(kind);

    let row = match (kind.entity_column(), filter.ids()) {
        (Some(col), Some(ids)) => {
            let sql = format!(
                "SELECT {entity} AS entity_id, date, amount FROM {table} \
                 WHERE date < $1 AND {col} = ANY($2) ORDER BY date DESC LIMIT 1"
            );
            sqlx::query_as::<_, TelemetrySample>(&sql)
                .bind(before)
                .bind(ids)
                .fetch_optional(pool)
                .await?
        }
        _ => {
            let sql = format!(
                "SELECT {entity} AS entity_id, date, amount FROM {table} \
                 WHERE date < $1 ORDER BY date DESC LIMIT 1"
            );
            sqlx::query_as::<_, TelemetrySample>(&sql)
                .bind(before)
                .fetch_optional(pool)
                .await?
        }
    };

    Ok(row)
}

/// Every consumer in `scope` with its latest consumption sample.
pub async fn consumer_readings(pool: &PgPool, scope: Scope) -> Result<Vec<ConsumerReading>> {
    let rows = sqlx::query_as::<_, ConsumerReading>(
        r#"
        SELECT
            c.id,
            c.suburb_id,
            c.street_address,
            c.high_priority,
            c.latitude,
            c.longitude,
            l.date   AS latest_date,
            l.amount AS latest_amount
        FROM consumer c
        LEFT JOIN LATERAL (
            SELECT cc.date, cc.amount
            FROM consumer_consumption cc
            WHERE cc.consumer_id = c.id
            ORDER BY cc.date DESC
            LIMIT 1
        ) l ON TRUE
        WHERE ($1::int4 IS NULL OR c.suburb_id = $1)
          AND ($2::int4 IS NULL OR c.id = $2)
        ORDER BY c.id
        "#,
    )
    .bind(scope.suburb_id())
    .bind(scope.consumer_id())
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Generator output joined with generator type, `start < date <= end`.
pub async fn typed_generation(
    pool: &PgPool,
    start: OffsetDateTime,
    end: OffsetDateTime,
    suburb_id: Option<i32>,
) -> Result<Vec<TypedGenerationSample>> {
    let rows = sqlx::query_as::<_, TypedGenerationSample>(
        r#"
        SELECT
            eg.generator_id,
            gt.category,
            gt.renewable,
            eg.date,
            eg.amount
        FROM energy_generation eg
        JOIN generator g       ON g.id = eg.generator_id
        JOIN generator_type gt ON gt.id = g.generator_type_id
        WHERE eg.date > $1
          AND eg.date <= $2
          AND ($3::int4 IS NULL OR g.suburb_id = $3)
        ORDER BY eg.date
        "#,
    )
    .bind(start)
    .bind(end)
    .bind(suburb_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
