use std::collections::{BTreeMap, BTreeSet};

use grid_client::domain::{EntityFilter, Scope, TelemetryKind, TelemetrySample, WarningType};
use serde::Serialize;
use time::{Duration, OffsetDateTime};

use super::{
    generation_filter,
    outage::{detect_outages, OutageRecord, OutageSettings},
    sources::{green_energy_percentage, serving_suburb},
};
use crate::{query::QueryError, store::TelemetryStore};

/// Rule categories the evaluator knows how to measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WarningCategory {
    HighUsage,
    LowUsage,
    HighCost,
    OutageHp,
    LowGreenEnergy,
}

impl WarningCategory {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "high_usage" => Some(Self::HighUsage),
            "low_usage" => Some(Self::LowUsage),
            "high_cost" => Some(Self::HighCost),
            "outage_hp" => Some(Self::OutageHp),
            "low_green_energy" => Some(Self::LowGreenEnergy),
            _ => None,
        }
    }

    pub fn suggestion(self) -> &'static str {
        match self {
            Self::HighUsage => "Bring additional generation online or shed non-critical load.",
            Self::LowUsage => "Reduce generator output to avoid wasting energy.",
            Self::HighCost => "Defer flexible consumption until prices fall.",
            Self::OutageHp => "Dispatch a crew to restore supply to this high priority consumer.",
            Self::LowGreenEnergy => "Prioritise renewable sources in the generation mix.",
        }
    }
}

/// Category-specific payload. Field names are part of the output contract.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WarningData {
    Utilisation { energy_utilised_percentage: f64 },
    Cost { energy_cost: f64 },
    Outage { consumer_id: i32, street_address: String },
    GreenEnergy { green_energy_percentage: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WarningInstance {
    pub category: String,
    pub description: String,
    pub suggestion: String,
    pub data: WarningData,
}

/// Live values the rules are checked against. `None` means not computable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveMetrics {
    /// Consumption divided by generation.
    pub energy_utilised: Option<f64>,
    pub selling_price: Option<f64>,
    pub high_priority_outages: Vec<OutageRecord>,
    pub green_energy_percentage: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarningSettings {
    pub utilisation_window: Duration,
    pub green_energy_window: Duration,
    pub outage: OutageSettings,
}

fn instance(rule: &WarningType, category: WarningCategory, data: WarningData) -> WarningInstance {
    WarningInstance {
        category: rule.category.clone(),
        description: rule.description.clone(),
        suggestion: category.suggestion().to_string(),
        data,
    }
}

/// Check every configured rule against the metrics.
pub fn evaluate_rules(rules: &[WarningType], metrics: &LiveMetrics) -> Vec<WarningInstance> {
    let mut warnings = Vec::new();

    for rule in rules {
        let Some(category) = WarningCategory::from_name(&rule.category) else {
            tracing::debug!(category = %rule.category, "skipping warning type with unknown category");
            continue;
        };

        match category {
            WarningCategory::HighUsage | WarningCategory::LowUsage => {
                if let Some(ratio) = metrics.energy_utilised.filter(|v| rule.is_violated_by(*v)) {
                    warnings.push(instance(
                        rule,
                        category,
                        WarningData::Utilisation {
                            energy_utilised_percentage: ratio,
                        },
                    ));
                }
            }
            WarningCategory::HighCost => {
                if let Some(price) = metrics.selling_price.filter(|v| rule.is_violated_by(*v)) {
                    warnings.push(instance(rule, category, WarningData::Cost { energy_cost: price }));
                }
            }
            WarningCategory::OutageHp => {
                let count = metrics.high_priority_outages.len() as f64;
                if rule.is_violated_by(count) {
                    warnings.extend(metrics.high_priority_outages.iter().map(|o| {
                        instance(
                            rule,
                            category,
                            WarningData::Outage {
                                consumer_id: o.consumer_id,
                                street_address: o.street_address.clone(),
                            },
                        )
                    }));
                }
            }
            WarningCategory::LowGreenEnergy => {
                if let Some(share) = metrics.green_energy_percentage.filter(|v| rule.is_violated_by(*v)) {
                    warnings.push(instance(
                        rule,
                        category,
                        WarningData::GreenEnergy {
                            green_energy_percentage: share,
                        },
                    ));
                }
            }
        }
    }

    warnings
}

/// Sum over entities of each entity's mean reading.
fn sum_of_entity_means(samples: &[TelemetrySample]) -> Option<f64> {
    let mut per_entity: BTreeMap<Option<i32>, (f64, u32)> = BTreeMap::new();
    for s in samples {
        let entry = per_entity.entry(s.entity_id).or_insert((0.0, 0));
        entry.0 += s.amount;
        entry.1 += 1;
    }

    if per_entity.is_empty() {
        return None;
    }
    Some(per_entity.values().map(|(sum, count)| sum / f64::from(*count)).sum())
}

async fn energy_utilised<S>(
    store: &S,
    scope: Scope,
    now: OffsetDateTime,
    window: Duration,
) -> Result<Option<f64>, QueryError>
where
    S: TelemetryStore + ?Sized,
{
    let suburbs = match serving_suburb(store, scope).await? {
        Some(id) => EntityFilter::single(id),
        None => EntityFilter::All,
    };
    let generators = generation_filter(store, scope).await?;
    if generators.is_empty() {
        return Ok(None);
    }

    let start = now - window;
    let consumption = store.samples(TelemetryKind::SuburbConsumption, start, now, &suburbs).await?;
    let generation = store.samples(TelemetryKind::GeneratorOutput, start, now, &generators).await?;

    Ok(match (sum_of_entity_means(&consumption), sum_of_entity_means(&generation)) {
        (Some(consumed), Some(generated)) if generated > 0.0 => Some(consumed / generated),
        _ => None,
    })
}

/// Measure only what the configured rules need.
pub async fn collect_metrics<S>(
    store: &S,
    rules: &[WarningType],
    scope: Scope,
    now: OffsetDateTime,
    settings: &WarningSettings,
) -> Result<LiveMetrics, QueryError>
where
    S: TelemetryStore + ?Sized,
{
    let needed: BTreeSet<WarningCategory> = rules
        .iter()
        .filter_map(|r| WarningCategory::from_name(&r.category))
        .collect();
    let mut metrics = LiveMetrics::default();

    if needed.contains(&WarningCategory::HighUsage) || needed.contains(&WarningCategory::LowUsage) {
        metrics.energy_utilised = energy_utilised(store, scope, now, settings.utilisation_window).await?;
    }

    if needed.contains(&WarningCategory::HighCost) {
        metrics.selling_price = store
            .latest_before(TelemetryKind::SellingPrice, now, &EntityFilter::All)
            .await?
            .map(|s| s.amount);
    }

    if needed.contains(&WarningCategory::OutageHp) {
        let readings = store.consumer_readings(scope).await?;
        metrics.high_priority_outages = detect_outages(&readings, now, &settings.outage.policy)
            .into_iter()
            .filter(|o| o.high_priority)
            .collect();
    }

    if needed.contains(&WarningCategory::LowGreenEnergy) {
        let suburb_id = serving_suburb(store, scope).await?;
        let samples = store
            .typed_generation(now - settings.green_energy_window, now, suburb_id)
            .await?;
        metrics.green_energy_percentage = green_energy_percentage(&samples);
    }

    Ok(metrics)
}

pub async fn evaluate<S>(
    store: &S,
    scope: Scope,
    now: OffsetDateTime,
    settings: &WarningSettings,
) -> Result<Vec<WarningInstance>, QueryError>
where
    S: TelemetryStore + ?Sized,
{
    let rules = store.warning_types().await?;
    let metrics = collect_metrics(store, &rules, scope, now, settings).await?;
    let warnings = evaluate_rules(&rules, &metrics);

    tracing::debug!(rules = rules.len(), warnings = warnings.len(), "evaluated warnings");
    Ok(warnings)
}
