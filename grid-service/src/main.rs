use std::{sync::Arc, time::Duration};

use anyhow::Result;
use grid_service::{
    api::{self, AppState},
    config::AppConfig,
    ingest::IngestHandler,
    metrics_server, observability,
    pipeline::{Pipeline, TopicMessage},
    scheduler,
    sinks::TelemetrySink,
    sources::{TopicBridge, TopicSource},
    store::{PgStore, TelemetryStore, TelemetryWriter},
};
use sqlx::postgres::PgPoolOptions;

async fn consume(
    source: TopicSource,
    writer: Arc<dyn TelemetryWriter>,
    max_retries: u32,
    retry_backoff: Duration,
    restart_backoff: Duration,
) -> Result<()> {
    let kind = source.kind();
    let handler = Arc::new(IngestHandler::new(kind, writer));
    let pipeline: Pipeline<_, TopicMessage, _> =
        Pipeline::new(source, TelemetrySink::new(handler, max_retries, retry_backoff));

    pipeline.run_supervised(kind.topic(), restart_backoff).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;

    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr).await?;
    }

    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect(&cfg.database.uri)
        .await?;
    let store = Arc::new(PgStore::new(pool));

    // The bridge stands in for the broker; each loop gets the receiver for its topic.
    let (bridge, sources) = TopicBridge::new(cfg.ingestion.channel_capacity);
    bridge.serve(&cfg.ingestion.http_bind_addr).await?;

    let ingestion = &cfg.ingestion;
    let loops = sources.into_iter().map(|source| {
        consume(
            source,
            store.clone(),
            ingestion.max_retries,
            Duration::from_millis(ingestion.retry_backoff_ms),
            Duration::from_millis(ingestion.restart_backoff_ms),
        )
    });

    let reader: Arc<dyn TelemetryStore> = store.clone();
    let state = AppState {
        store: reader.clone(),
        settings: cfg.warning_settings(),
    };

    let reports = async {
        match &cfg.reports {
            Some(reports) => scheduler::run(reader.clone(), Duration::from_secs(reports.interval_secs)).await,
            None => {
                tracing::info!("report scheduler disabled");
                Ok(())
            }
        }
    };

    tokio::try_join!(
        futures::future::try_join_all(loops),
        api::serve(state, &cfg.api.bind_addr),
        reports,
    )?;

    Ok(())
}
