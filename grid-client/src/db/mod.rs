pub mod reference_queries;
pub mod report_queries;
pub mod telemetry_queries;

pub use telemetry_queries::WriteError;
