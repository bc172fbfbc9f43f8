//! Read-side HTTP shell over the analytics engines.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use grid_client::domain::{Report, TelemetryKind};
use serde::Serialize;
use serde_json::{json, Value};
use time::OffsetDateTime;

use crate::{
    analytics::{
        self,
        finance::{profit_margin, spending},
        outage::power_outages,
        report::{create_report, report_content, ReportContent, ReportRequest},
        sources::{energy_sources, green_energy_status, GreenEnergyStatus},
        warnings::{evaluate, WarningSettings},
        Bucket,
    },
    query::{ensure_scope_exists, reject_consumer_scope, require_grid_scope, QueryError, RangeParams},
    store::TelemetryStore,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TelemetryStore>,
    pub settings: WarningSettings,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::MalformedInput(m) | QueryError::NoData(m) => Self::new(StatusCode::BAD_REQUEST, m),
            QueryError::NotFound(m) => Self::new(StatusCode::NOT_FOUND, m),
            QueryError::Store(e) => {
                tracing::error!(error = %e, "store query failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse { error: self.message });
        (self.status, body).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/consumption", get(get_consumption))
        .route("/generation", get(get_generation))
        .route("/spot-price", get(get_spot_price))
        .route("/selling-price", get(get_selling_price))
        .route("/profit-margin", get(get_profit_margin))
        .route("/spending", get(get_spending))
        .route("/energy-sources", get(get_energy_sources))
        .route("/green-energy", get(get_green_energy))
        .route("/outages", get(get_outages))
        .route("/warnings", get(get_warnings))
        .route("/reports", get(list_reports).post(post_report))
        .route("/reports/:id", get(get_report))
        .with_state(state)
}

/// Serve the API until the listener fails.
pub async fn serve(state: AppState, bind_addr: &str) -> anyhow::Result<()> {
    let addr: SocketAddr = bind_addr
        .parse()
        .with_context(|| format!("invalid api bind address {bind_addr:?}"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind api listener on {addr}"))?;

    tracing::info!(%addr, "api listening");
    axum::serve(listener, router(state).into_make_service()).await?;
    Ok(())
}

async fn get_consumption(State(state): State<AppState>, Query(params): Query<RangeParams>) -> ApiResult<Vec<Bucket>> {
    let store = state.store.as_ref();
    let range = params.date_range(OffsetDateTime::now_utc())?;
    let scope = params.scope()?;
    ensure_scope_exists(store, scope).await?;

    Ok(Json(analytics::consumption(store, scope, range).await?))
}

async fn get_generation(State(state): State<AppState>, Query(params): Query<RangeParams>) -> ApiResult<Vec<Bucket>> {
    let store = state.store.as_ref();
    let range = params.date_range(OffsetDateTime::now_utc())?;
    let scope = params.scope()?;
    reject_consumer_scope(scope, "generation")?;
    ensure_scope_exists(store, scope).await?;

    Ok(Json(analytics::generation(store, scope, range).await?))
}

async fn price_series(state: &AppState, params: &RangeParams, kind: TelemetryKind) -> ApiResult<Vec<Bucket>> {
    let range = params.date_range(OffsetDateTime::now_utc())?;
    require_grid_scope(params.scope()?, kind.topic())?;

    Ok(Json(analytics::prices(state.store.as_ref(), kind, range).await?))
}

async fn get_spot_price(State(state): State<AppState>, Query(params): Query<RangeParams>) -> ApiResult<Vec<Bucket>> {
    price_series(&state, &params, TelemetryKind::SpotPrice).await
}

async fn get_selling_price(State(state): State<AppState>, Query(params): Query<RangeParams>) -> ApiResult<Vec<Bucket>> {
    price_series(&state, &params, TelemetryKind::SellingPrice).await
}

async fn get_profit_margin(State(state): State<AppState>, Query(params): Query<RangeParams>) -> ApiResult<Vec<Bucket>> {
    let range = params.date_range(OffsetDateTime::now_utc())?;
    require_grid_scope(params.scope()?, "profit margin")?;

    Ok(Json(profit_margin(state.store.as_ref(), range).await?))
}

async fn get_spending(State(state): State<AppState>, Query(params): Query<RangeParams>) -> ApiResult<Vec<Bucket>> {
    let store = state.store.as_ref();
    let range = params.date_range(OffsetDateTime::now_utc())?;
    let scope = params.scope()?;
    ensure_scope_exists(store, scope).await?;

    Ok(Json(spending(store, scope, range).await?))
}

async fn get_energy_sources(State(state): State<AppState>, Query(params): Query<RangeParams>) -> ApiResult<Value> {
    let store = state.store.as_ref();
    let range = params.date_range(OffsetDateTime::now_utc())?;
    let scope = params.scope()?;
    reject_consumer_scope(scope, "energy sources")?;
    ensure_scope_exists(store, scope).await?;

    let sources = energy_sources(store, scope, range).await?;
    Ok(Json(json!({ "sources": sources })))
}

async fn get_green_energy(
    State(state): State<AppState>,
    Query(params): Query<RangeParams>,
) -> ApiResult<GreenEnergyStatus> {
    let store = state.store.as_ref();
    let scope = params.scope()?;
    reject_consumer_scope(scope, "green energy")?;
    ensure_scope_exists(store, scope).await?;

    let status = green_energy_status(store, scope, OffsetDateTime::now_utc(), state.settings.green_energy_window).await?;
    Ok(Json(status))
}

async fn get_outages(State(state): State<AppState>, Query(params): Query<RangeParams>) -> ApiResult<Value> {
    let store = state.store.as_ref();
    let scope = params.scope()?;
    ensure_scope_exists(store, scope).await?;

    let outages = power_outages(store, scope, OffsetDateTime::now_utc(), &state.settings.outage).await?;
    Ok(Json(json!({ "power_outages": outages })))
}

async fn get_warnings(State(state): State<AppState>, Query(params): Query<RangeParams>) -> ApiResult<Value> {
    let store = state.store.as_ref();
    let scope = params.scope()?;
    ensure_scope_exists(store, scope).await?;

    let warnings = evaluate(store, scope, OffsetDateTime::now_utc(), &state.settings).await?;
    Ok(Json(json!({ "warnings": warnings })))
}

async fn list_reports(State(state): State<AppState>) -> ApiResult<Vec<Report>> {
    let reports = state.store.reports().await.map_err(QueryError::from)?;
    Ok(Json(reports))
}

async fn get_report(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<ReportContent> {
    let id: i32 = id
        .parse()
        .map_err(|_| ApiError::new(StatusCode::BAD_REQUEST, format!("Invalid report id: {id}")))?;

    let content = report_content(state.store.as_ref(), id, OffsetDateTime::now_utc(), &state.settings).await?;
    Ok(Json(content))
}

async fn post_report(
    State(state): State<AppState>,
    Json(request): Json<ReportRequest>,
) -> Result<(StatusCode, Json<Report>), ApiError> {
    let report = create_report(state.store.as_ref(), &request, OffsetDateTime::now_utc()).await?;
    Ok((StatusCode::CREATED, Json(report)))
}
