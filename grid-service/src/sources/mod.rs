pub mod http_topics;
pub mod ndjson_replay;
pub mod record;

pub use http_topics::{TopicBridge, TopicSource};
pub use ndjson_replay::NdjsonReplaySource;
pub use record::TopicRecord;
