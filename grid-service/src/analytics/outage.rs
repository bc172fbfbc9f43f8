//! Outage detection and spatial clustering.
//!
//! A consumer is in outage when its latest consumption sample is older than
//! its lookback window or reads zero. Outaged consumers are grouped with
//! DBSCAN over great-circle distance; points that end up as noise are dropped
//! unless they are high priority, in which case they are reported as a
//! cluster of one.

use std::collections::VecDeque;

use geo::{Distance, Haversine, Point};
use grid_client::domain::{ConsumerReading, Scope};
use serde::Serialize;
use time::{Duration, OffsetDateTime};

use crate::{query::QueryError, store::TelemetryStore};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutagePolicy {
    pub high_priority_window: Duration,
    pub standard_window: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterParams {
    /// Neighbourhood radius in metres.
    pub radius_m: f64,
    /// Neighbours (the point included) a point needs to be a core point.
    pub min_points: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutageSettings {
    pub policy: OutagePolicy,
    pub clustering: ClusterParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    Normal,
    Outage,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutageRecord {
    pub consumer_id: i32,
    pub street_address: String,
    pub suburb_id: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub high_priority: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    pub consumers: Vec<OutageRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PowerOutages {
    pub consumers: Vec<OutageRecord>,
    pub clusters: Vec<Cluster>,
}

/// State of one consumer at `now`; `None` when it has never reported.
pub fn power_state(reading: &ConsumerReading, now: OffsetDateTime, policy: &OutagePolicy) -> Option<PowerState> {
    let (Some(date), Some(amount)) = (reading.latest_date, reading.latest_amount) else {
        return None;
    };

    let window = if reading.consumer.high_priority {
        policy.high_priority_window
    } else {
        policy.standard_window
    };

    if date < now - window || amount == 0.0 {
        Some(PowerState::Outage)
    } else {
        Some(PowerState::Normal)
    }
}

pub fn detect_outages(readings: &[ConsumerReading], now: OffsetDateTime, policy: &OutagePolicy) -> Vec<OutageRecord> {
    readings
        .iter()
        .filter(|r| power_state(r, now, policy) == Some(PowerState::Outage))
        .map(|r| OutageRecord {
            consumer_id: r.consumer.id,
            street_address: r.consumer.street_address.clone(),
            suburb_id: r.consumer.suburb_id,
            latitude: r.consumer.latitude,
            longitude: r.consumer.longitude,
            high_priority: r.consumer.high_priority,
        })
        .collect()
}

/// Density clustering of outaged consumers.
pub fn cluster_outages(records: &[OutageRecord], params: &ClusterParams) -> Vec<Cluster> {
    let points: Vec<Point<f64>> = records
        .iter()
        .map(|r| Point::new(r.longitude, r.latitude))
        .collect();
    let neighbours = |i: usize| -> Vec<usize> {
        (0..points.len())
            .filter(|&j| Haversine.distance(points[i], points[j]) <= params.radius_m)
            .collect()
    };

    let mut labels: Vec<Option<usize>> = vec![None; points.len()];
    let mut visited = vec![false; points.len()];
    let mut groups: Vec<Vec<usize>> = Vec::new();

    for i in 0..points.len() {
        if visited[i] {
            continue;
        }
        visited[i] = true;

        let seeds = neighbours(i);
        if seeds.len() < params.min_points {
            continue;
        }

        let label = groups.len();
        groups.push(vec![i]);
        labels[i] = Some(label);

        let mut queue: VecDeque<usize> = seeds.into_iter().filter(|&j| j != i).collect();
        while let Some(j) = queue.pop_front() {
            if labels[j].is_none() {
                labels[j] = Some(label);
                groups[label].push(j);
            }
            if visited[j] {
                continue;
            }
            visited[j] = true;

            let reachable = neighbours(j);
            if reachable.len() >= params.min_points {
                queue.extend(reachable.into_iter().filter(|&k| labels[k].is_none()));
            }
        }
    }

    // Isolated critical outages must stay visible.
    for (i, record) in records.iter().enumerate() {
        if labels[i].is_none() && record.high_priority {
            groups.push(vec![i]);
        }
    }

    let mut clusters: Vec<Cluster> = groups
        .into_iter()
        .map(|members| {
            let mut consumers: Vec<OutageRecord> = members.into_iter().map(|i| records[i].clone()).collect();
            consumers.sort_by_key(|r| r.consumer_id);
            Cluster { consumers }
        })
        .collect();
    clusters.sort_by_key(|c| c.consumers.first().map(|r| r.consumer_id));

    clusters
}

/// Cluster outaged consumers and list every clustered consumer once, by id.
pub fn summarise(records: &[OutageRecord], params: &ClusterParams) -> PowerOutages {
    let clusters = cluster_outages(records, params);

    let mut consumers: Vec<OutageRecord> = clusters
        .iter()
        .flat_map(|c| c.consumers.iter().cloned())
        .collect();
    consumers.sort_by_key(|r| r.consumer_id);
    consumers.dedup_by_key(|r| r.consumer_id);

    PowerOutages { consumers, clusters }
}

pub async fn power_outages<S>(
    store: &S,
    scope: Scope,
    now: OffsetDateTime,
    settings: &OutageSettings,
) -> Result<PowerOutages, QueryError>
where
    S: TelemetryStore + ?Sized,
{
    let readings = store.consumer_readings(scope).await?;
    let outaged = detect_outages(&readings, now, &settings.policy);
    let outages = summarise(&outaged, &settings.clustering);

    tracing::debug!(
        consumers = readings.len(),
        outaged = outaged.len(),
        clustered = outages.consumers.len(),
        clusters = outages.clusters.len(),
        "evaluated power outages"
    );

    Ok(outages)
}
