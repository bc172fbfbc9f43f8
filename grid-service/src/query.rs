//! Validation of the query surface shared by the HTTP shell and reports.

use grid_client::domain::Scope;
use serde::Deserialize;
use time::{
    format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime,
};

use crate::store::TelemetryStore;

/// Read-path failures. All are local to one request; nothing partial is returned.
#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    /// Bad dates, ids or conflicting filters.
    #[error("{0}")]
    MalformedInput(String),
    #[error("{0}")]
    NotFound(String),
    /// The metric has no underlying data; reported instead of a misleading zero.
    #[error("{0}")]
    NoData(String),
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

/// Raw query-string parameters, kept as strings so bad input can be reported precisely.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RangeParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub suburb_id: Option<String>,
    pub consumer_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(ts);
    }

    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .ok()
        .map(|d| d.midnight().assume_utc())
}

/// `start_date` is required; `end_date` defaults to `now`. Neither may lie in
/// the future and the range may not be inverted.
pub fn validate_range(
    start_date: Option<&str>,
    end_date: Option<&str>,
    now: OffsetDateTime,
) -> Result<DateRange, QueryError> {
    let raw_start = start_date
        .ok_or_else(|| QueryError::MalformedInput("start_date is required".to_string()))?;
    let start = parse_timestamp(raw_start)
        .ok_or_else(|| QueryError::MalformedInput(format!("Invalid start_date: {raw_start}")))?;
    if start > now {
        return Err(QueryError::MalformedInput(
            "start_date cannot be in the future".to_string(),
        ));
    }

    let end = match end_date {
        Some(raw_end) => parse_timestamp(raw_end)
            .ok_or_else(|| QueryError::MalformedInput(format!("Invalid end_date: {raw_end}")))?,
        None => now,
    };
    if end > now {
        return Err(QueryError::MalformedInput(
            "end_date cannot be in the future".to_string(),
        ));
    }
    if end < start {
        return Err(QueryError::MalformedInput(
            "end_date must not be before start_date".to_string(),
        ));
    }

    Ok(DateRange { start, end })
}

pub fn validate_scope(suburb_id: Option<i32>, consumer_id: Option<i32>) -> Result<Scope, QueryError> {
    match (suburb_id, consumer_id) {
        (Some(_), Some(_)) => Err(QueryError::MalformedInput(
            "suburb_id and consumer_id cannot be combined".to_string(),
        )),
        (Some(id), None) => Ok(Scope::Suburb(id)),
        (None, Some(id)) => Ok(Scope::Consumer(id)),
        (None, None) => Ok(Scope::Grid),
    }
}

fn parse_id(raw: Option<&str>, name: &str) -> Result<Option<i32>, QueryError> {
    raw.map(|r| {
        r.trim()
            .parse::<i32>()
            .map_err(|_| QueryError::MalformedInput(format!("Invalid {name}: {r}")))
    })
    .transpose()
}

impl RangeParams {
    pub fn date_range(&self, now: OffsetDateTime) -> Result<DateRange, QueryError> {
        validate_range(self.start_date.as_deref(), self.end_date.as_deref(), now)
    }

    pub fn scope(&self) -> Result<Scope, QueryError> {
        let suburb_id = parse_id(self.suburb_id.as_deref(), "suburb_id")?;
        let consumer_id = parse_id(self.consumer_id.as_deref(), "consumer_id")?;
        validate_scope(suburb_id, consumer_id)
    }
}

/// Confirm the entity a scope names exists.
pub async fn ensure_scope_exists<S>(store: &S, scope: Scope) -> Result<(), QueryError>
where
    S: TelemetryStore + ?Sized,
{
    match scope {
        Scope::Grid => Ok(()),
        Scope::Suburb(id) => match store.suburb(id).await? {
            Some(_) => Ok(()),
            None => Err(QueryError::NotFound(format!("Suburb {id} not found"))),
        },
        Scope::Consumer(id) => match store.consumer(id).await? {
            Some(_) => Ok(()),
            None => Err(QueryError::NotFound(format!("Consumer {id} not found"))),
        },
    }
}

/// Reject consumer scopes for series that only exist per suburb or grid-wide.
pub fn reject_consumer_scope(scope: Scope, what: &str) -> Result<(), QueryError> {
    match scope {
        Scope::Consumer(_) => Err(QueryError::MalformedInput(format!(
            "{what} cannot be filtered by consumer_id"
        ))),
        _ => Ok(()),
    }
}

/// Reject any entity filter for system-wide series.
pub fn require_grid_scope(scope: Scope, what: &str) -> Result<(), QueryError> {
    match scope {
        Scope::Grid => Ok(()),
        _ => Err(QueryError::MalformedInput(format!(
            "{what} is system-wide and cannot be filtered"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2024-03-10 12:00:00 UTC);

    #[test]
    fn end_defaults_to_now() {
        let range = validate_range(Some("2024-03-01"), None, NOW).unwrap();
        assert_eq!(range.start, datetime!(2024-03-01 00:00:00 UTC));
        assert_eq!(range.end, NOW);
    }

    #[test]
    fn accepts_rfc3339_with_offset() {
        let range = validate_range(Some("2024-03-01T10:00:00+10:00"), Some("2024-03-02T00:00:00Z"), NOW).unwrap();
        assert_eq!(range.start, datetime!(2024-03-01 00:00:00 UTC));
    }

    #[test]
    fn rejects_missing_bad_future_and_inverted_dates() {
        for (start, end) in [
            (None, None),
            (Some("not-a-date"), None),
            (Some("2024-03-11"), None),
            (Some("2024-03-01"), Some("2024-03-11")),
            (Some("2024-03-05"), Some("2024-03-01")),
            (Some("2024-03-01"), Some("soon")),
        ] {
            assert!(
                matches!(validate_range(start, end, NOW), Err(QueryError::MalformedInput(_))),
                "{start:?} {end:?}"
            );
        }
    }

    #[test]
    fn scope_parsing() {
        let mut params = RangeParams::default();
        assert_eq!(params.scope().unwrap(), Scope::Grid);

        params.suburb_id = Some("4".to_string());
        assert_eq!(params.scope().unwrap(), Scope::Suburb(4));

        params.consumer_id = Some("9".to_string());
        assert!(matches!(params.scope(), Err(QueryError::MalformedInput(_))));

        params.suburb_id = None;
        params.consumer_id = Some("nine".to_string());
        assert!(matches!(params.scope(), Err(QueryError::MalformedInput(_))));
    }

    #[tokio::test]
    async fn unknown_entities_are_not_found() {
        let store = crate::store::memory::MemoryStore::default();
        store.add_suburb(crate::store::memory::suburb(1));

        assert!(ensure_scope_exists(&store, Scope::Suburb(1)).await.is_ok());
        assert!(matches!(
            ensure_scope_exists(&store, Scope::Suburb(2)).await,
            Err(QueryError::NotFound(_))
        ));
        assert!(matches!(
            ensure_scope_exists(&store, Scope::Consumer(2)).await,
            Err(QueryError::NotFound(_))
        ));
    }
}
