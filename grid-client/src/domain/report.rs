use serde::Serialize;
use time::OffsetDateTime;

use super::Scope;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Report {
    pub id: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub start_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_date: OffsetDateTime,
    pub suburb_id: Option<i32>,
    pub consumer_id: Option<i32>,
}

impl Report {
    pub fn scope(&self) -> Scope {
        match (self.suburb_id, self.consumer_id) {
            (Some(id), _) => Scope::Suburb(id),
            (None, Some(id)) => Scope::Consumer(id),
            (None, None) => Scope::Grid,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    pub start_date: OffsetDateTime,
    pub end_date: OffsetDateTime,
    pub scope: Scope,
}
