//! HTTP stand-in for the message broker.
//!
//! `POST /topics/{topic}` accepts a JSON array of records and fans them into a
//! bounded channel per telemetry kind. Each consumer loop owns a
//! [`TopicSource`] for its kind; the receiver outlives any single stream so a
//! restarted loop re-attaches where the previous one stopped.

use std::{collections::BTreeMap, net::SocketAddr, sync::Arc, time::SystemTime};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use futures::Stream;
use grid_client::domain::TelemetryKind;
use time::OffsetDateTime;
use tokio::sync::{mpsc, Mutex};

use super::record::TopicRecord;
use crate::pipeline::{Envelope, PipelineError, Source, TopicMessage};

type Sender = mpsc::Sender<Envelope<TopicMessage>>;
type Receiver = mpsc::Receiver<Envelope<TopicMessage>>;

#[derive(thiserror::Error, Debug)]
pub enum PublishError {
    #[error("unknown topic {0:?}")]
    UnknownTopic(String),
    #[error("topic {0} is no longer consumed")]
    Closed(&'static str),
}

/// Producer side of the bridge. Cheap to clone.
#[derive(Clone)]
pub struct TopicBridge {
    senders: Arc<BTreeMap<TelemetryKind, Sender>>,
}

/// Consumer side for one topic.
#[derive(Clone)]
pub struct TopicSource {
    kind: TelemetryKind,
    receiver: Arc<Mutex<Receiver>>,
}

impl TopicBridge {
    /// Create the bridge and one source per telemetry kind, in `TelemetryKind::ALL` order.
    pub fn new(channel_capacity: usize) -> (Self, Vec<TopicSource>) {
        let mut senders = BTreeMap::new();
        let mut sources = Vec::with_capacity(TelemetryKind::ALL.len());

        for kind in TelemetryKind::ALL {
            let (tx, rx) = mpsc::channel(channel_capacity);
            senders.insert(kind, tx);
            sources.push(TopicSource {
                kind,
                receiver: Arc::new(Mutex::new(rx)),
            });
        }

        (
            Self {
                senders: Arc::new(senders),
            },
            sources,
        )
    }

    pub async fn publish(&self, topic: &str, records: Vec<TopicRecord>) -> Result<usize, PublishError> {
        let kind = TelemetryKind::from_topic(topic).ok_or_else(|| PublishError::UnknownTopic(topic.to_string()))?;
        let tx = self
            .senders
            .get(&kind)
            .ok_or_else(|| PublishError::UnknownTopic(topic.to_string()))?;

        let received = OffsetDateTime::now_utc();
        let count = records.len();
        for record in records {
            let env = Envelope {
                payload: record.into_message(received),
                received_at: SystemTime::now(),
            };
            tx.send(env).await.map_err(|_| PublishError::Closed(kind.topic()))?;
        }

        metrics::counter!("topic_bridge_records_total", "topic" => kind.topic()).increment(count as u64);
        Ok(count)
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/topics/:topic", post(publish_records))
            .with_state(self.clone())
    }

    /// Bind the bridge listener and serve it in the background.
    pub async fn serve(&self, bind_addr: &str) -> Result<(), PipelineError> {
        let addr: SocketAddr = bind_addr
            .parse()
            .map_err(|e| PipelineError::Source(format!("invalid bind addr: {e}")))?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| PipelineError::Source(format!("failed to bind topic bridge listener: {e}")))?;
        let app = self.router();

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                tracing::error!(error = %e, "topic bridge server error");
            }
        });

        tracing::info!(%addr, "topic bridge listening");
        Ok(())
    }
}

impl TopicSource {
    pub fn kind(&self) -> TelemetryKind {
        self.kind
    }
}

#[async_trait::async_trait]
impl Source<TopicMessage> for TopicSource {
    async fn stream(
        &self,
    ) -> std::pin::Pin<Box<dyn Stream<Item = Result<Envelope<TopicMessage>, PipelineError>> + Send>> {
        let receiver = self.receiver.clone();

        // The guard lives inside the stream, so dropping the stream frees the receiver.
        let s = async_stream::stream! {
            let mut rx = receiver.lock_owned().await;
            while let Some(env) = rx.recv().await {
                yield Ok(env);
            }
        };

        Box::pin(s)
    }
}

async fn publish_records(
    State(bridge): State<TopicBridge>,
    Path(topic): Path<String>,
    Json(records): Json<Vec<TopicRecord>>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    metrics::counter!("http_ingest_requests_total").increment(1);

    match bridge.publish(&topic, records).await {
        Ok(accepted) => Ok(Json(serde_json::json!({ "accepted": accepted }))),
        Err(PublishError::UnknownTopic(t)) => {
            tracing::debug!(topic = %t, "rejecting records for unknown topic");
            Err(StatusCode::NOT_FOUND)
        }
        Err(e) => {
            metrics::counter!("http_ingest_failed_total").increment(1);
            tracing::error!(error = %e, "failed to hand records to consumer loop");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn record(key: &str) -> TopicRecord {
        TopicRecord {
            key: Some(serde_json::Value::String(key.to_string())),
            value: Some(serde_json::json!({"value": 1.0, "date": "2024-03-01T10:00:00Z"})),
            timestamp: None,
        }
    }

    fn source_for(sources: &[TopicSource], kind: TelemetryKind) -> TopicSource {
        sources.iter().find(|s| s.kind() == kind).cloned().unwrap()
    }

    #[tokio::test]
    async fn records_reach_only_their_topic() {
        let (bridge, sources) = TopicBridge::new(8);
        assert_eq!(sources.len(), TelemetryKind::ALL.len());

        let accepted = bridge
            .publish("generator-production", vec![record("1"), record("2")])
            .await
            .unwrap();
        assert_eq!(accepted, 2);

        let mut generation = source_for(&sources, TelemetryKind::GeneratorOutput).stream().await;
        let first = generation.next().await.unwrap().unwrap();
        assert_eq!(first.payload.key.as_deref(), Some("1".as_bytes()));

        let spot = source_for(&sources, TelemetryKind::SpotPrice);
        assert!(spot.receiver.lock().await.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_topic_is_rejected() {
        let (bridge, _sources) = TopicBridge::new(8);
        assert!(matches!(
            bridge.publish("weather", vec![record("1")]).await,
            Err(PublishError::UnknownTopic(_))
        ));
    }

    #[tokio::test]
    async fn restarted_consumer_resumes_from_the_same_receiver() {
        let (bridge, sources) = TopicBridge::new(8);
        let source = source_for(&sources, TelemetryKind::SuburbConsumption);
        bridge
            .publish("suburb-consumption", vec![record("1"), record("2")])
            .await
            .unwrap();

        let mut first = source.stream().await;
        let one = first.next().await.unwrap().unwrap();
        assert_eq!(one.payload.key.as_deref(), Some("1".as_bytes()));
        drop(first);

        let mut second = source.stream().await;
        let two = second.next().await.unwrap().unwrap();
        assert_eq!(two.payload.key.as_deref(), Some("2".as_bytes()));
    }
}
