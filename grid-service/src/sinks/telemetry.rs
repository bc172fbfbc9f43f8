use std::{sync::Arc, time::Duration};

use futures::StreamExt;

use crate::{
    ingest::{Ack, IngestError, IngestHandler},
    pipeline::{Envelope, PipelineError, Sink, TopicMessage},
};

/// Feeds one topic's messages through its ingestion handler, one row at a time.
///
/// Store failures other than key conflicts are retried with linear backoff;
/// anything still failing, and every malformed message, ends the run so the
/// supervisor can restart the loop.
pub struct TelemetrySink {
    handler: Arc<IngestHandler>,
    max_retries: u32,
    retry_backoff: Duration,
}

impl TelemetrySink {
    pub fn new(handler: Arc<IngestHandler>, max_retries: u32, retry_backoff: Duration) -> Self {
        Self {
            handler,
            max_retries,
            retry_backoff,
        }
    }

    async fn ingest_with_retry(&self, msg: &TopicMessage) -> Result<Ack, IngestError> {
        let mut attempt: u32 = 0;
        loop {
            match self.handler.ingest(msg).await {
                Err(IngestError::Write(e)) if attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        topic = self.handler.kind().topic(),
                        error = %e,
                        attempt,
                        "telemetry write failed, retrying with backoff"
                    );
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                other => return other,
            }
        }
    }
}

#[async_trait::async_trait]
impl Sink<TopicMessage> for TelemetrySink {
    async fn run<S>(&self, mut input: S) -> Result<(), PipelineError>
    where
        S: futures::Stream<Item = Result<Envelope<TopicMessage>, PipelineError>> + Send + Unpin + 'static,
    {
        let topic = self.handler.kind().topic();

        while let Some(item) = input.next().await {
            let env = match item {
                Ok(env) => env,
                Err(e) => {
                    tracing::error!(topic, error = %e, "error in upstream pipeline for TelemetrySink");
                    continue;
                }
            };

            if let Err(e) = self.ingest_with_retry(&env.payload).await {
                metrics::counter!("telemetry_fatal_errors_total", "topic" => topic).increment(1);
                tracing::error!(topic, error = %e, "fatal ingestion error, aborting consumer loop");
                return Err(e.into());
            }

            if let Ok(dur) = std::time::SystemTime::now().duration_since(env.received_at) {
                metrics::histogram!("ingest_end_to_end_latency_seconds", "topic" => topic).record(dur.as_secs_f64());
            }
        }

        Ok(())
    }
}
