pub mod analytics;
pub mod api;
pub mod config;
pub mod ingest;
pub mod metrics_server;
pub mod observability;
pub mod pipeline;
pub mod query;
pub mod scheduler;
pub mod sinks;
pub mod sources;
pub mod store;

pub use pipeline::{Envelope, Pipeline, TopicMessage};
