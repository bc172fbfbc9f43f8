use anyhow::{bail, Result};
use grid_client::domain::TelemetryKind;
use grid_service::{
    config::AppConfig, ingest::IngestHandler, observability, pipeline::{Pipeline, TopicMessage}, sinks::TelemetrySink,
    sources::NdjsonReplaySource, store::PgStore,
};
use sqlx::postgres::PgPoolOptions;
use std::{env, sync::Arc, time::Duration};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        bail!("usage: backfill_telemetry <topic> <ndjson_file_path>");
    }
    let Some(kind) = TelemetryKind::from_topic(&args[1]) else {
        bail!("unknown topic {:?}", args[1]);
    };
    let file_path = &args[2];

    // Point GRID_CONFIG at a backfill-specific file if needed.
    let cfg = AppConfig::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect(&cfg.database.uri)
        .await?;

    let handler = IngestHandler::new(kind, Arc::new(PgStore::new(pool)));
    let sink = TelemetrySink::new(
        Arc::new(handler),
        cfg.ingestion.max_retries,
        Duration::from_millis(cfg.ingestion.retry_backoff_ms),
    );

    let pipeline: Pipeline<_, TopicMessage, _> = Pipeline::new(NdjsonReplaySource::new(file_path), sink);
    pipeline.run().await?;

    tracing::info!(topic = kind.topic(), file = %file_path, "backfill complete");
    Ok(())
}
