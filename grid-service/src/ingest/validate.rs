use grid_client::domain::{TelemetryKind, TelemetrySample};
use time::macros::datetime;

use super::IngestError;

/// Pure validation of a parsed telemetry sample.
///
/// Rules:
/// - amount must be finite.
/// - power readings (consumption, production) must be non-negative; prices may go negative.
/// - date must be within a broad sanity window [2000-01-01, 2100-01-01].
pub fn validate_sample(kind: TelemetryKind, sample: &TelemetrySample) -> Result<(), IngestError> {
    if !sample.amount.is_finite() {
        return Err(IngestError::Rejected("amount must be finite".to_string()));
    }

    if !kind.is_price() && sample.amount < 0.0 {
        return Err(IngestError::Rejected("amount must be non-negative".to_string()));
    }

    let min_ts = datetime!(2000-01-01 00:00:00 UTC);
    let max_ts = datetime!(2100-01-01 00:00:00 UTC);

    if sample.date < min_ts || sample.date > max_ts {
        return Err(IngestError::Rejected("timestamp out of allowed range".to_string()));
    }

    Ok(())
}
