//! Stored reports. Only the range and scope are persisted; content is
//! recomputed from the store on every read.

use grid_client::domain::{NewReport, Report, Scope, TelemetryKind};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{
    consumption,
    finance::spending,
    generation, prices,
    sources::{energy_sources, SourceShare},
    warnings::{evaluate, WarningInstance, WarningSettings},
    Bucket,
};
use crate::{
    query::{ensure_scope_exists, validate_range, validate_scope, DateRange, QueryError},
    store::TelemetryStore,
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportRequest {
    pub start_date: String,
    pub end_date: Option<String>,
    pub suburb_id: Option<i32>,
    pub consumer_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportContent {
    pub report: Report,
    pub consumption: Vec<Bucket>,
    pub generation: Vec<Bucket>,
    pub spot_price: Vec<Bucket>,
    pub selling_price: Vec<Bucket>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spending: Option<Vec<Bucket>>,
    pub energy_sources: Vec<SourceShare>,
    pub warnings: Vec<WarningInstance>,
}

pub async fn create_report<S>(store: &S, request: &ReportRequest, now: OffsetDateTime) -> Result<Report, QueryError>
where
    S: TelemetryStore + ?Sized,
{
    let range = validate_range(Some(&request.start_date), request.end_date.as_deref(), now)?;
    let scope = validate_scope(request.suburb_id, request.consumer_id)?;
    ensure_scope_exists(store, scope).await?;

    let report = store
        .create_report(&NewReport {
            start_date: range.start,
            end_date: range.end,
            scope,
        })
        .await?;

    tracing::info!(report_id = report.id, ?scope, "created report");
    Ok(report)
}

pub async fn report_content<S>(
    store: &S,
    id: i32,
    now: OffsetDateTime,
    settings: &WarningSettings,
) -> Result<ReportContent, QueryError>
where
    S: TelemetryStore + ?Sized,
{
    let report = store
        .report(id)
        .await?
        .ok_or_else(|| QueryError::NotFound(format!("Report {id} not found")))?;
    let scope = report.scope();
    let range = DateRange {
        start: report.start_date,
        end: report.end_date,
    };

    let spending = match scope {
        Scope::Consumer(_) => Some(spending(store, scope, range).await?),
        _ => None,
    };

    Ok(ReportContent {
        consumption: consumption(store, scope, range).await?,
        generation: generation(store, scope, range).await?,
        spot_price: prices(store, TelemetryKind::SpotPrice, range).await?,
        selling_price: prices(store, TelemetryKind::SellingPrice, range).await?,
        spending,
        energy_sources: energy_sources(store, scope, range).await?,
        warnings: evaluate(store, scope, now, settings).await?,
        report,
    })
}
