pub mod entities;
pub mod report;
pub mod telemetry;
pub mod warning;

pub use entities::{Consumer, ConsumerReading, Generator, GeneratorType, Suburb};
pub use report::{NewReport, Report};
pub use telemetry::{EntityFilter, Scope, TelemetryKind, TelemetrySample, TypedGenerationSample};
pub use warning::{GoalType, WarningType};
