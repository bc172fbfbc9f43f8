use anyhow::Result;
use sqlx::PgPool;

use crate::domain::{NewReport, Report};

/// Reports are append-only: there is no update path.
pub async fn insert_report(pool: &PgPool, report: &NewReport) -> Result<Report> {
    let row = sqlx::query_as::<_, Report>(
        r#"
        INSERT INTO report (start_date, end_date, suburb_id, consumer_id)
        VALUES ($1, $2, $3, $4)
        RETURNING id, start_date, end_date, suburb_id, consumer_id
        "#,
    )
    .bind(report.start_date)
    .bind(report.end_date)
    .bind(report.scope.suburb_id())
    .bind(report.scope.consumer_id())
    .fetch_one(pool)
    .await?;

    Ok(row)
}

pub async fn report_by_id(pool: &PgPool, id: i32) -> Result<Option<Report>> {
    let row = sqlx::query_as::<_, Report>(
        "SELECT id, start_date, end_date, suburb_id, consumer_id FROM report WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn list_reports(pool: &PgPool) -> Result<Vec<Report>> {
    let rows = sqlx::query_as::<_, Report>(
        "SELECT id, start_date, end_date, suburb_id, consumer_id FROM report ORDER BY start_date DESC, id DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
