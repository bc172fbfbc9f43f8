use anyhow::Result;
use sqlx::PgPool;

use crate::domain::{Consumer, GoalType, Suburb, WarningType};

pub async fn suburb_by_id(pool: &PgPool, id: i32) -> Result<Option<Suburb>> {
    let row = sqlx::query_as::<_, Suburb>(
        "SELECT id, name, postcode, state, latitude, longitude FROM suburb WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn consumer_by_id(pool: &PgPool, id: i32) -> Result<Option<Consumer>> {
    let row = sqlx::query_as::<_, Consumer>(
        r#"
        SELECT id, suburb_id, street_address, high_priority, latitude, longitude
        FROM consumer
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Ids of the generators located in a suburb, or of every generator.
pub async fn generator_ids(pool: &PgPool, suburb_id: Option<i32>) -> Result<Vec<i32>> {
    let ids = sqlx::query_scalar::<_, i32>(
        "SELECT id FROM generator WHERE ($1::int4 IS NULL OR suburb_id = $1) ORDER BY id",
    )
    .bind(suburb_id)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

pub async fn warning_types(pool: &PgPool) -> Result<Vec<WarningType>> {
    let rows = sqlx::query_as::<_, WarningType>(
        r#"
        SELECT id, category, description, trigger_greater_than, target, goal_type_id
        FROM warning_type
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn goal_type_by_id(pool: &PgPool, id: i32) -> Result<Option<GoalType>> {
    let row = sqlx::query_as::<_, GoalType>("SELECT id, category, description FROM goal_type WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}
