use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;

use crate::pipeline::TopicMessage;

/// Wire form of one broker record, shared by the HTTP bridge and NDJSON replay.
///
/// `key` may be a string or a bare number. `value` is either the JSON payload
/// itself or a string holding it. A missing `timestamp` means "received now".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopicRecord {
    #[serde(default)]
    pub key: Option<Value>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub timestamp: Option<OffsetDateTime>,
}

fn raw_bytes(value: Value) -> Vec<u8> {
    match value {
        Value::String(s) => s.into_bytes(),
        other => other.to_string().into_bytes(),
    }
}

impl TopicRecord {
    pub fn into_message(self, received: OffsetDateTime) -> TopicMessage {
        TopicMessage {
            key: self.key.filter(|k| !k.is_null()).map(raw_bytes),
            value: self.value.filter(|v| !v.is_null()).map(raw_bytes),
            timestamp: self.timestamp.unwrap_or(received),
        }
    }
}
