use serde::Serialize;
use time::OffsetDateTime;

/// The five telemetry series kept by the store.
///
/// Power kinds carry an entity id and are measured in kW; price kinds are
/// system-wide and carry no entity id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryKind {
    SuburbConsumption,
    ConsumerConsumption,
    GeneratorOutput,
    SpotPrice,
    SellingPrice,
}

impl TelemetryKind {
    pub const ALL: [TelemetryKind; 5] = [
        TelemetryKind::SuburbConsumption,
        TelemetryKind::ConsumerConsumption,
        TelemetryKind::GeneratorOutput,
        TelemetryKind::SpotPrice,
        TelemetryKind::SellingPrice,
    ];

    /// Streaming topic the kind is published on.
    pub fn topic(self) -> &'static str {
        match self {
            Self::SuburbConsumption => "suburb-consumption",
            Self::ConsumerConsumption => "consumer-consumption",
            Self::GeneratorOutput => "generator-production",
            Self::SpotPrice => "spot-price",
            Self::SellingPrice => "selling-price",
        }
    }

    pub fn from_topic(topic: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.topic() == topic)
    }

    pub fn table(self) -> &'static str {
        match self {
            Self::SuburbConsumption => "suburb_consumption",
            Self::ConsumerConsumption => "consumer_consumption",
            Self::GeneratorOutput => "energy_generation",
            Self::SpotPrice => "spot_price",
            Self::SellingPrice => "selling_price",
        }
    }

    /// Foreign-key column naming the entity, `None` for price series.
    pub fn entity_column(self) -> Option<&'static str> {
        match self {
            Self::SuburbConsumption => Some("suburb_id"),
            Self::ConsumerConsumption => Some("consumer_id"),
            Self::GeneratorOutput => Some("generator_id"),
            Self::SpotPrice | Self::SellingPrice => None,
        }
    }

    pub fn is_price(self) -> bool {
        self.entity_column().is_none()
    }
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct TelemetrySample {
    pub entity_id: Option<i32>,
    pub date: OffsetDateTime,
    pub amount: f64,
}

/// Generator output joined with the generator's type.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct TypedGenerationSample {
    pub generator_id: i32,
    pub category: String,
    pub renewable: bool,
    pub date: OffsetDateTime,
    pub amount: f64,
}

/// Restricts a series read to a set of entities. Ignored for price series.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityFilter {
    All,
    Ids(Vec<i32>),
}

impl EntityFilter {
    pub fn single(id: i32) -> Self {
        Self::Ids(vec![id])
    }

    /// True when the filter can match no entity at all.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Ids(ids) if ids.is_empty())
    }

    pub fn ids(&self) -> Option<&[i32]> {
        match self {
            Self::All => None,
            Self::Ids(ids) => Some(ids),
        }
    }
}

/// Part of the grid a query is about. Suburb and consumer are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Grid,
    Suburb(i32),
    Consumer(i32),
}

impl Scope {
    pub fn suburb_id(self) -> Option<i32> {
        match self {
            Self::Suburb(id) => Some(id),
            _ => None,
        }
    }

    pub fn consumer_id(self) -> Option<i32> {
        match self {
            Self::Consumer(id) => Some(id),
            _ => None,
        }
    }
}
