use std::{marker::PhantomData, pin::Pin, time::Duration, time::SystemTime};

use futures::Stream;
use time::OffsetDateTime;

use crate::ingest::IngestError;

#[derive(Debug, Clone)]
pub struct Envelope<T> {
    pub payload: T,
    pub received_at: SystemTime,
}

/// A raw message as delivered by the broker for one topic.
///
/// `timestamp` is the transport timestamp; the sample time lives inside `value`.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicMessage {
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
    pub timestamp: OffsetDateTime,
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("source error: {0}")]
    Source(String),
    #[error("sink error: {0}")]
    Sink(String),
    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),
}

#[async_trait::async_trait]
pub trait Source<T>: Send + Sync {
    async fn stream(
        &self,
    ) -> Pin<Box<dyn Stream<Item = Result<Envelope<T>, PipelineError>> + Send>>;
}

#[async_trait::async_trait]
pub trait Sink<T>: Send + Sync {
    async fn run<S>(&self, input: S) -> Result<(), PipelineError>
    where
        S: Stream<Item = Result<Envelope<T>, PipelineError>> + Send + Unpin + 'static;
}

pub struct Pipeline<S, T, K> {
    pub source: S,
    pub sink: K,
    _marker: PhantomData<fn() -> T>,
}

impl<T, S, K> Pipeline<S, T, K>
where
    T: Send + 'static,
    S: Source<T> + Send + Sync + 'static,
    K: Sink<T> + Send + Sync + 'static,
{
    pub fn new(source: S, sink: K) -> Self {
        Self {
            source,
            sink,
            _marker: PhantomData,
        }
    }

    /// Drain the source into the sink until the stream ends or the sink fails.
    pub async fn run(&self) -> Result<(), PipelineError> {
        let stream = self.source.stream().await;
        self.sink.run(stream).await
    }

    /// Run the pipeline, restarting it after `backoff` whenever it fails.
    ///
    /// Returns once the source stream ends cleanly.
    pub async fn run_supervised(&self, name: &str, backoff: Duration) -> Result<(), PipelineError> {
        loop {
            match self.run().await {
                Ok(()) => {
                    tracing::info!(pipeline = name, "pipeline source closed, stopping");
                    return Ok(());
                }
                Err(e) => {
                    metrics::counter!("pipeline_restarts_total", "pipeline" => name.to_string())
                        .increment(1);
                    tracing::error!(
                        pipeline = name,
                        error = %e,
                        backoff_ms = backoff.as_millis() as u64,
                        "pipeline failed, restarting"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}
