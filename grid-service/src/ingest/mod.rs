//! Per-topic ingestion handlers.
//!
//! A handler parses one broker message into a telemetry sample, validates it
//! and writes a single row. Malformed messages are fatal to the consumer loop;
//! missing-entity and duplicate-timestamp rejections from the store are logged
//! and acknowledged so the stream keeps moving.

pub mod validate;

use std::sync::Arc;

use grid_client::{
    db::WriteError,
    domain::{TelemetryKind, TelemetrySample},
};
use serde::Deserialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::{pipeline::TopicMessage, store::TelemetryWriter};

pub use validate::validate_sample;

/// How a message was consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Stored,
    Duplicate,
    UnknownEntity,
}

#[derive(thiserror::Error, Debug)]
pub enum IngestError {
    #[error("message key is missing")]
    MissingKey,
    #[error("message value is missing")]
    MissingValue,
    #[error("message key {0:?} is not an integer entity id")]
    InvalidKey(String),
    #[error("message value is not a telemetry payload: {0}")]
    InvalidValue(String),
    #[error("sample date {0:?} is not a valid timestamp")]
    InvalidDate(String),
    #[error("sample rejected: {0}")]
    Rejected(String),
    #[error("write failed: {0}")]
    Write(#[source] WriteError),
}

#[derive(Deserialize)]
struct SamplePayload {
    value: f64,
    date: String,
}

fn parse_key(raw: &[u8]) -> Result<i32, IngestError> {
    let key = std::str::from_utf8(raw)
        .map_err(|_| IngestError::InvalidKey(String::from_utf8_lossy(raw).into_owned()))?;

    key.trim()
        .parse()
        .map_err(|_| IngestError::InvalidKey(key.to_string()))
}

/// Decode a broker message into a sample. Price topics ignore the key.
pub fn parse_message(kind: TelemetryKind, msg: &TopicMessage) -> Result<TelemetrySample, IngestError> {
    let entity_id = if kind.is_price() {
        None
    } else {
        let key = msg.key.as_deref().ok_or(IngestError::MissingKey)?;
        Some(parse_key(key)?)
    };

    let value = msg.value.as_deref().ok_or(IngestError::MissingValue)?;
    let payload: SamplePayload =
        serde_json::from_slice(value).map_err(|e| IngestError::InvalidValue(e.to_string()))?;

    let date = OffsetDateTime::parse(payload.date.trim(), &Rfc3339)
        .map_err(|_| IngestError::InvalidDate(payload.date.clone()))?;

    Ok(TelemetrySample {
        entity_id,
        date,
        amount: payload.value,
    })
}

fn unknown_entity_message(kind: TelemetryKind) -> &'static str {
    match kind {
        TelemetryKind::SuburbConsumption => "suburb does not exist, dropping suburb consumption sample",
        TelemetryKind::ConsumerConsumption => "consumer does not exist, dropping consumer consumption sample",
        TelemetryKind::GeneratorOutput => "generator does not exist, dropping generator production sample",
        TelemetryKind::SpotPrice => "spot price sample rejected by foreign key, dropping",
        TelemetryKind::SellingPrice => "selling price sample rejected by foreign key, dropping",
    }
}

fn duplicate_message(kind: TelemetryKind) -> &'static str {
    match kind {
        TelemetryKind::SuburbConsumption => "suburb consumption already recorded for this timestamp",
        TelemetryKind::ConsumerConsumption => "consumer consumption already recorded for this timestamp",
        TelemetryKind::GeneratorOutput => "generator production already recorded for this timestamp",
        TelemetryKind::SpotPrice => "spot price already recorded for this timestamp",
        TelemetryKind::SellingPrice => "selling price already recorded for this timestamp",
    }
}

/// Handler for one telemetry kind, bound to the store it writes into.
pub struct IngestHandler {
    kind: TelemetryKind,
    writer: Arc<dyn TelemetryWriter>,
}

impl IngestHandler {
    pub fn new(kind: TelemetryKind, writer: Arc<dyn TelemetryWriter>) -> Self {
        Self { kind, writer }
    }

    pub fn kind(&self) -> TelemetryKind {
        self.kind
    }

    pub async fn ingest(&self, msg: &TopicMessage) -> Result<Ack, IngestError> {
        let topic = self.kind.topic();

        let sample = parse_message(self.kind, msg)?;
        if let Err(e) = validate_sample(self.kind, &sample) {
            metrics::counter!("validation_telemetry_rejected_total", "topic" => topic).increment(1);
            return Err(e);
        }

        match self.writer.insert_sample(self.kind, &sample, msg.timestamp).await {
            Ok(()) => {
                metrics::counter!("telemetry_ingested_records_total", "topic" => topic).increment(1);
                Ok(Ack::Stored)
            }
            Err(WriteError::ForeignKeyViolation(detail)) => {
                metrics::counter!("telemetry_unknown_entity_total", "topic" => topic).increment(1);
                tracing::warn!(
                    topic,
                    entity_id = ?sample.entity_id,
                    detail = %detail,
                    "{}",
                    unknown_entity_message(self.kind)
                );
                Ok(Ack::UnknownEntity)
            }
            Err(WriteError::UniqueViolation(detail)) => {
                metrics::counter!("telemetry_duplicate_total", "topic" => topic).increment(1);
                tracing::warn!(
                    topic,
                    entity_id = ?sample.entity_id,
                    date = %sample.date,
                    detail = %detail,
                    "{}",
                    duplicate_message(self.kind)
                );
                Ok(Ack::Duplicate)
            }
            Err(e) => Err(IngestError::Write(e)),
        }
    }
}
