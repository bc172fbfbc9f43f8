pub mod telemetry;

pub use telemetry::TelemetrySink;
