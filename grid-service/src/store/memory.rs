//! In-memory store used by the unit tests. Enforces the same foreign-key and
//! uniqueness rules as the relational schema.

use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};

use anyhow::Result;
use grid_client::{
    db::WriteError,
    domain::{
        Consumer, ConsumerReading, EntityFilter, Generator, GeneratorType, GoalType, NewReport, Report,
        Scope, Suburb, TelemetryKind, TelemetrySample, TypedGenerationSample, WarningType,
    },
};
use time::OffsetDateTime;

use super::{TelemetryStore, TelemetryWriter};

#[derive(Default)]
struct Inner {
    samples: BTreeMap<TelemetryKind, Vec<TelemetrySample>>,
    suburbs: Vec<Suburb>,
    consumers: Vec<Consumer>,
    generators: Vec<Generator>,
    generator_types: Vec<GeneratorType>,
    warning_types: Vec<WarningType>,
    goal_types: Vec<GoalType>,
    reports: Vec<Report>,
    fail_writes: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

pub fn suburb(id: i32) -> Suburb {
    Suburb {
        id,
        name: format!("Suburb {id}"),
        postcode: 2000 + id,
        state: "NSW".to_string(),
        latitude: -33.86,
        longitude: 151.2,
    }
}

pub fn consumer(id: i32, suburb_id: i32, high_priority: bool, latitude: f64, longitude: f64) -> Consumer {
    Consumer {
        id,
        suburb_id,
        street_address: format!("{id} Example St"),
        high_priority,
        latitude,
        longitude,
    }
}

pub fn warning_type(id: i32, category: &str, trigger_greater_than: bool, target: f64) -> WarningType {
    WarningType {
        id,
        category: category.to_string(),
        description: format!("{category} rule"),
        trigger_greater_than,
        target,
        goal_type_id: None,
    }
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("memory store poisoned")
    }

    pub fn add_suburb(&self, suburb: Suburb) {
        self.lock().suburbs.push(suburb);
    }

    pub fn add_consumer(&self, consumer: Consumer) {
        self.lock().consumers.push(consumer);
    }

    pub fn add_generator(&self, id: i32, suburb_id: i32, category: &str, renewable: bool) {
        let mut inner = self.lock();
        let type_id = match inner.generator_types.iter().find(|t| t.category == category) {
            Some(t) => t.id,
            None => {
                let id = inner.generator_types.len() as i32 + 1;
                inner.generator_types.push(GeneratorType {
                    id,
                    category: category.to_string(),
                    renewable,
                });
                id
            }
        };
        inner.generators.push(Generator {
            id,
            suburb_id,
            generator_type_id: type_id,
        });
    }

    pub fn add_warning_type(&self, warning_type: WarningType) {
        self.lock().warning_types.push(warning_type);
    }

    pub fn add_goal_type(&self, goal_type: GoalType) {
        self.lock().goal_types.push(goal_type);
    }

    /// Insert a sample without constraint checks.
    pub fn push_sample(&self, kind: TelemetryKind, entity_id: Option<i32>, date: OffsetDateTime, amount: f64) {
        self.lock().samples.entry(kind).or_default().push(TelemetrySample {
            entity_id,
            date,
            amount,
        });
    }

    pub fn sample_count(&self, kind: TelemetryKind) -> usize {
        self.lock().samples.get(&kind).map_or(0, Vec::len)
    }

    pub fn fail_writes(&self) {
        self.lock().fail_writes = true;
    }
}

fn matches_filter(sample: &TelemetrySample, filter: &EntityFilter) -> bool {
    match (filter.ids(), sample.entity_id) {
        (Some(ids), Some(id)) => ids.contains(&id),
        _ => true,
    }
}

#[async_trait::async_trait]
impl TelemetryWriter for MemoryStore {
    async fn insert_sample(
        &self,
        kind: TelemetryKind,
        sample: &TelemetrySample,
        _ingested_at: OffsetDateTime,
    ) -> Result<(), WriteError> {
        let mut inner = self.lock();
        if inner.fail_writes {
            return Err(WriteError::Database(sqlx::Error::PoolTimedOut));
        }

        let exists = match (kind, sample.entity_id) {
            (TelemetryKind::SuburbConsumption, Some(id)) => inner.suburbs.iter().any(|s| s.id == id),
            (TelemetryKind::ConsumerConsumption, Some(id)) => inner.consumers.iter().any(|c| c.id == id),
            (TelemetryKind::GeneratorOutput, Some(id)) => inner.generators.iter().any(|g| g.id == id),
            (TelemetryKind::SpotPrice | TelemetryKind::SellingPrice, _) => true,
            (_, None) => false,
        };
        if !exists {
            return Err(WriteError::ForeignKeyViolation(format!(
                "{} references missing entity {:?}",
                kind.table(),
                sample.entity_id
            )));
        }

        let series = inner.samples.entry(kind).or_default();
        if series
            .iter()
            .any(|s| s.entity_id == sample.entity_id && s.date == sample.date)
        {
            return Err(WriteError::UniqueViolation(format!("{} duplicate key", kind.table())));
        }
        series.push(sample.clone());
        Ok(())
    }
}

#[async_trait::async_trait]
impl TelemetryStore for MemoryStore {
    async fn samples(
        &self,
        kind: TelemetryKind,
        start: OffsetDateTime,
        end: OffsetDateTime,
        filter: &EntityFilter,
    ) -> Result<Vec<TelemetrySample>> {
        let inner = self.lock();
        let mut rows: Vec<TelemetrySample> = inner
            .samples
            .get(&kind)
            .into_iter()
            .flatten()
            .filter(|s| s.date > start && s.date <= end && matches_filter(s, filter))
            .cloned()
            .collect();
        rows.sort_by_key(|s| s.date);
        Ok(rows)
    }

    async fn latest_before(
        &self,
        kind: TelemetryKind,
        before: OffsetDateTime,
        filter: &EntityFilter,
    ) -> Result<Option<TelemetrySample>> {
        let inner = self.lock();
        Ok(inner
            .samples
            .get(&kind)
            .into_iter()
            .flatten()
            .filter(|s| s.date < before && matches_filter(s, filter))
            .max_by_key(|s| s.date)
            .cloned())
    }

    async fn consumer_readings(&self, scope: Scope) -> Result<Vec<ConsumerReading>> {
        let inner = self.lock();
        let history = inner.samples.get(&TelemetryKind::ConsumerConsumption);

        let mut readings: Vec<ConsumerReading> = inner
            .consumers
            .iter()
            .filter(|c| match scope {
                Scope::Grid => true,
                Scope::Suburb(id) => c.suburb_id == id,
                Scope::Consumer(id) => c.id == id,
            })
            .map(|c| {
                let latest = history
                    .into_iter()
                    .flatten()
                    .filter(|s| s.entity_id == Some(c.id))
                    .max_by_key(|s| s.date);
                ConsumerReading {
                    consumer: c.clone(),
                    latest_date: latest.map(|s| s.date),
                    latest_amount: latest.map(|s| s.amount),
                }
            })
            .collect();
        readings.sort_by_key(|r| r.consumer.id);
        Ok(readings)
    }

    async fn typed_generation(
        &self,
        start: OffsetDateTime,
        end: OffsetDateTime,
        suburb_id: Option<i32>,
    ) -> Result<Vec<TypedGenerationSample>> {
        let inner = self.lock();
        let mut rows = Vec::new();
        for s in inner.samples.get(&TelemetryKind::GeneratorOutput).into_iter().flatten() {
            if s.date <= start || s.date > end {
                continue;
            }
            let Some(generator) = inner.generators.iter().find(|g| Some(g.id) == s.entity_id) else {
                continue;
            };
            if suburb_id.is_some_and(|id| generator.suburb_id != id) {
                continue;
            }
            let Some(gt) = inner
                .generator_types
                .iter()
                .find(|t| t.id == generator.generator_type_id)
            else {
                continue;
            };
            rows.push(TypedGenerationSample {
                generator_id: generator.id,
                category: gt.category.clone(),
                renewable: gt.renewable,
                date: s.date,
                amount: s.amount,
            });
        }
        rows.sort_by_key(|r| r.date);
        Ok(rows)
    }

    async fn generator_ids(&self, suburb_id: Option<i32>) -> Result<Vec<i32>> {
        let inner = self.lock();
        Ok(inner
            .generators
            .iter()
            .filter(|g| suburb_id.map_or(true, |id| g.suburb_id == id))
            .map(|g| g.id)
            .collect())
    }

    async fn suburb(&self, id: i32) -> Result<Option<Suburb>> {
        Ok(self.lock().suburbs.iter().find(|s| s.id == id).cloned())
    }

    async fn consumer(&self, id: i32) -> Result<Option<Consumer>> {
        Ok(self.lock().consumers.iter().find(|c| c.id == id).cloned())
    }

    async fn warning_types(&self) -> Result<Vec<WarningType>> {
        Ok(self.lock().warning_types.clone())
    }

    async fn goal_type(&self, id: i32) -> Result<Option<GoalType>> {
        Ok(self.lock().goal_types.iter().find(|g| g.id == id).cloned())
    }

    async fn create_report(&self, report: &NewReport) -> Result<Report> {
        let mut inner = self.lock();
        let created = Report {
            id: inner.reports.len() as i32 + 1,
            start_date: report.start_date,
            end_date: report.end_date,
            suburb_id: report.scope.suburb_id(),
            consumer_id: report.scope.consumer_id(),
        };
        inner.reports.push(created.clone());
        Ok(created)
    }

    async fn report(&self, id: i32) -> Result<Option<Report>> {
        Ok(self.lock().reports.iter().find(|r| r.id == id).cloned())
    }

    async fn reports(&self) -> Result<Vec<Report>> {
        Ok(self.lock().reports.clone())
    }
}
