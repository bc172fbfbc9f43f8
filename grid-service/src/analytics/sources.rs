//! Generation broken down by generator type.
//!
//! Shares are the ratio of each category's average power to the sum of the
//! category averages, not a ratio of per-bucket energies.

use std::collections::BTreeMap;

use grid_client::domain::{GoalType, Scope, TypedGenerationSample};
use serde::Serialize;
use time::{Duration, OffsetDateTime};

use crate::{
    query::{DateRange, QueryError},
    store::TelemetryStore,
};

/// Rule category whose target is the green-energy goal.
pub const GREEN_ENERGY_RULE: &str = "low_green_energy";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GreenEnergyStatus {
    pub green_energy_percentage: f64,
    /// Percentage the grid is expected to stay at or above.
    pub target: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<GoalType>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceShare {
    pub category: String,
    pub renewable: bool,
    /// Mean of the category's samples, kW.
    pub average_power: f64,
    /// `average_power` held over the whole range, kWh.
    pub energy: f64,
    /// Share of the summed category averages, 0..=100.
    pub percentage: f64,
}

pub fn source_breakdown(samples: &[TypedGenerationSample], range_hours: f64) -> Vec<SourceShare> {
    let mut by_category: BTreeMap<&str, (bool, f64, u32)> = BTreeMap::new();
    for s in samples {
        let entry = by_category.entry(s.category.as_str()).or_insert((s.renewable, 0.0, 0));
        entry.1 += s.amount;
        entry.2 += 1;
    }

    let averages: Vec<(&str, bool, f64)> = by_category
        .into_iter()
        .map(|(category, (renewable, sum, count))| (category, renewable, sum / f64::from(count)))
        .collect();
    let total: f64 = averages.iter().map(|a| a.2).sum();

    averages
        .into_iter()
        .map(|(category, renewable, average_power)| SourceShare {
            category: category.to_string(),
            renewable,
            average_power,
            energy: average_power * range_hours,
            percentage: if total > 0.0 { average_power / total * 100.0 } else { 0.0 },
        })
        .collect()
}

/// Renewable share of generation in percent, `None` without any samples.
pub fn green_energy_percentage(samples: &[TypedGenerationSample]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }

    let shares = source_breakdown(samples, 0.0);
    Some(
        shares
            .iter()
            .filter(|s| s.renewable)
            .fold(0.0, |acc, s| acc + s.percentage),
    )
}

/// Suburb whose generators serve a scope. Unknown consumers are `NotFound`.
pub(crate) async fn serving_suburb<S>(store: &S, scope: Scope) -> Result<Option<i32>, QueryError>
where
    S: TelemetryStore + ?Sized,
{
    match scope {
        Scope::Grid => Ok(None),
        Scope::Suburb(id) => Ok(Some(id)),
        Scope::Consumer(id) => store
            .consumer(id)
            .await?
            .map(|c| Some(c.suburb_id))
            .ok_or_else(|| QueryError::NotFound(format!("Consumer {id} not found"))),
    }
}

pub async fn energy_sources<S>(store: &S, scope: Scope, range: DateRange) -> Result<Vec<SourceShare>, QueryError>
where
    S: TelemetryStore + ?Sized,
{
    let suburb_id = serving_suburb(store, scope).await?;
    let samples = store.typed_generation(range.start, range.end, suburb_id).await?;
    let hours = (range.end - range.start).as_seconds_f64() / 3_600.0;

    Ok(source_breakdown(&samples, hours))
}

/// Green share over the trailing `window`. Without generation records this is
/// an error rather than zero.
pub async fn green_energy<S>(
    store: &S,
    scope: Scope,
    now: OffsetDateTime,
    window: Duration,
) -> Result<f64, QueryError>
where
    S: TelemetryStore + ?Sized,
{
    let suburb_id = serving_suburb(store, scope).await?;
    let samples = store.typed_generation(now - window, now, suburb_id).await?;

    green_energy_percentage(&samples).ok_or_else(|| {
        QueryError::NoData(format!(
            "No generation data in the last {} hours",
            window.whole_hours()
        ))
    })
}

/// Green share alongside the configured target. Missing generation or a
/// missing `low_green_energy` rule are both `NoData`.
pub async fn green_energy_status<S>(
    store: &S,
    scope: Scope,
    now: OffsetDateTime,
    window: Duration,
) -> Result<GreenEnergyStatus, QueryError>
where
    S: TelemetryStore + ?Sized,
{
    let green_energy_percentage = green_energy(store, scope, now, window).await?;

    let rule = store
        .warning_types()
        .await?
        .into_iter()
        .find(|w| w.category == GREEN_ENERGY_RULE)
        .ok_or_else(|| QueryError::NoData(format!("No target configured for {GREEN_ENERGY_RULE}")))?;
    let goal = match rule.goal_type_id {
        Some(id) => store.goal_type(id).await?,
        None => None,
    };

    Ok(GreenEnergyStatus {
        green_energy_percentage,
        target: rule.target,
        goal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{self, MemoryStore};
    use grid_client::domain::TelemetryKind;
    use serde_json::json;
    use time::macros::datetime;

    fn typed(category: &str, renewable: bool, amount: f64) -> TypedGenerationSample {
        TypedGenerationSample {
            generator_id: 1,
            category: category.to_string(),
            renewable,
            date: datetime!(2024-03-01 00:00:00 UTC),
            amount,
        }
    }

    #[test]
    fn shares_use_category_averages() {
        let samples = vec![
            typed("solar", true, 10.0),
            typed("solar", true, 30.0),
            typed("solar", true, 20.0),
            typed("coal", false, 60.0),
        ];

        let shares = source_breakdown(&samples, 2.0);

        assert_eq!(shares.len(), 2);
        let coal = &shares[0];
        let solar = &shares[1];
        assert_eq!(coal.category, "coal");
        assert_eq!(solar.average_power, 20.0);
        assert_eq!(solar.energy, 40.0);
        assert!((coal.percentage - 75.0).abs() < 1e-9);
        assert!((solar.percentage - 25.0).abs() < 1e-9);
        assert_eq!(green_energy_percentage(&samples), Some(25.0));
    }

    #[test]
    fn no_samples_is_no_green_share() {
        assert_eq!(green_energy_percentage(&[]), None);
        assert!(source_breakdown(&[], 1.0).is_empty());
    }

    #[tokio::test]
    async fn green_energy_without_generation_is_no_data() {
        let store = MemoryStore::default();
        let now = datetime!(2024-03-01 12:00:00 UTC);

        let err = green_energy(&store, Scope::Grid, now, Duration::hours(24)).await.unwrap_err();
        assert!(matches!(err, QueryError::NoData(_)));

        store.add_generator(1, 1, "wind", true);
        store.add_generator(2, 2, "gas", false);
        store.push_sample(TelemetryKind::GeneratorOutput, Some(1), now - Duration::hours(1), 30.0);
        store.push_sample(TelemetryKind::GeneratorOutput, Some(2), now - Duration::hours(1), 90.0);

        let grid = green_energy(&store, Scope::Grid, now, Duration::hours(24)).await.unwrap();
        assert!((grid - 25.0).abs() < 1e-9);

        let suburb = green_energy(&store, Scope::Suburb(1), now, Duration::hours(24)).await.unwrap();
        assert!((suburb - 100.0).abs() < 1e-9);
    }

    #[test]
    fn fossil_only_generation_is_positive_zero() {
        let samples = vec![typed("coal", false, 50.0), typed("gas", false, 20.0)];

        let share = green_energy_percentage(&samples).unwrap();
        assert_eq!(share, 0.0);
        assert!(share.is_sign_positive());
        assert_eq!(
            serde_json::to_string(&json!({ "green_energy_percentage": share })).unwrap(),
            r#"{"green_energy_percentage":0.0}"#
        );
    }

    #[tokio::test]
    async fn status_needs_a_configured_target() {
        let store = MemoryStore::default();
        let now = datetime!(2024-03-01 12:00:00 UTC);
        store.add_generator(1, 1, "solar", true);
        store.push_sample(TelemetryKind::GeneratorOutput, Some(1), now - Duration::hours(2), 40.0);

        let err = green_energy_status(&store, Scope::Grid, now, Duration::hours(24))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::NoData(ref msg) if msg.contains(GREEN_ENERGY_RULE)));

        store.add_warning_type(memory::warning_type(1, "high_cost", true, 0.5));
        assert!(matches!(
            green_energy_status(&store, Scope::Grid, now, Duration::hours(24)).await,
            Err(QueryError::NoData(_))
        ));

        let mut rule = memory::warning_type(2, GREEN_ENERGY_RULE, false, 40.0);
        rule.goal_type_id = Some(3);
        store.add_warning_type(rule);
        store.add_goal_type(GoalType {
            id: 3,
            category: "renewables".to_string(),
            description: "Keep renewables above 40%".to_string(),
        });

        let status = green_energy_status(&store, Scope::Grid, now, Duration::hours(24)).await.unwrap();
        assert!((status.green_energy_percentage - 100.0).abs() < 1e-9);
        assert_eq!(status.target, 40.0);
        assert_eq!(status.goal.map(|g| g.id), Some(3));
    }

    #[tokio::test]
    async fn unknown_consumer_has_no_serving_suburb() {
        let store = MemoryStore::default();
        store.add_suburb(memory::suburb(4));
        store.add_consumer(memory::consumer(9, 4, false, -33.0, 151.0));

        assert_eq!(serving_suburb(&store, Scope::Consumer(9)).await.unwrap(), Some(4));
        assert!(matches!(
            serving_suburb(&store, Scope::Consumer(10)).await,
            Err(QueryError::NotFound(_))
        ));
    }
}
