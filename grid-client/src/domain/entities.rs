use serde::Serialize;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Suburb {
    pub id: i32,
    pub name: String,
    pub postcode: i32,
    pub state: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Consumer {
    pub id: i32,
    pub suburb_id: i32,
    pub street_address: String,
    pub high_priority: bool,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Generator {
    pub id: i32,
    pub suburb_id: i32,
    pub generator_type_id: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct GeneratorType {
    pub id: i32,
    pub category: String,
    pub renewable: bool,
}

/// A consumer together with its most recent consumption sample, if any was
/// ever recorded.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ConsumerReading {
    #[sqlx(flatten)]
    pub consumer: Consumer,
    pub latest_date: Option<OffsetDateTime>,
    pub latest_amount: Option<f64>,
}
