//! Threshold aggregator: a bounded-time queue of detection events, evaluated
//! every tick against per-type and weighted-accumulative thresholds, with
//! optional proximity clustering and dynamic race-start scaling.

pub mod cluster;

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

use crate::detectors::{DetectionEvent, EventType};
use cluster::{cluster_by_proximity, Cluster};

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub window: Duration,
    pub per_type_thresholds: HashMap<EventType, u32>,
    pub weights: HashMap<EventType, u32>,
    pub accumulative_threshold: u32,
    pub proximity_enabled: bool,
    pub proximity_distance: f64,
    pub race_start_multiplier: f64,
    pub race_start_window: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        let mut per_type_thresholds = HashMap::new();
        per_type_thresholds.insert(EventType::Stopped, 2);
        per_type_thresholds.insert(EventType::OffTrack, 3);
        per_type_thresholds.insert(EventType::Random, 1);

        let mut weights = HashMap::new();
        weights.insert(EventType::Stopped, 2);
        weights.insert(EventType::OffTrack, 1);
        weights.insert(EventType::Random, 4);

        Self {
            window: Duration::seconds(5),
            per_type_thresholds,
            weights,
            accumulative_threshold: 4,
            proximity_enabled: false,
            proximity_distance: 0.05,
            race_start_multiplier: 1.0,
            race_start_window: Duration::seconds(0),
        }
    }
}

/// Describes why a cluster tripped the aggregator, used to compose the
/// `!y` message the sequencer sends.
#[derive(Debug, Clone)]
pub struct TripReport {
    pub reason: String,
    pub events: Vec<DetectionEvent>,
}

pub struct ThresholdAggregator {
    config: AggregatorConfig,
    queue: Vec<(DateTime<Utc>, DetectionEvent)>,
    race_start: Option<DateTime<Utc>>,
}

impl ThresholdAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            config,
            queue: Vec::new(),
            race_start: None,
        }
    }

    pub fn set_race_start(&mut self, at: DateTime<Utc>) {
        self.race_start = Some(at);
    }

    /// Age out, ingest, and evaluate. Returns `Some` exactly when a cluster
    /// has tripped; the caller is expected to call `clear` immediately
    /// afterward once it begins a caution.
    pub fn tick(&mut self, events: Vec<DetectionEvent>, now: DateTime<Utc>) -> Option<TripReport> {
        self.age_out(now);
        for event in events {
            self.queue.push((now, event));
        }
        self.evaluate(now)
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    fn age_out(&mut self, now: DateTime<Utc>) {
        let cutoff = now - self.config.window;
        self.queue.retain(|(ts, _)| *ts >= cutoff);
    }

    /// The deduplicated "latest" event per (slot, type) key still in-window.
    fn latest(&self) -> Vec<DetectionEvent> {
        let mut by_key: HashMap<_, &DetectionEvent> = HashMap::new();
        for (ts, event) in &self.queue {
            by_key
                .entry(event.key())
                .and_modify(|existing| {
                    if *ts > existing.timestamp {
                        *existing = event;
                    }
                })
                .or_insert(event);
        }
        by_key.into_values().cloned().collect()
    }

    fn scale(&self, now: DateTime<Utc>, value: u32) -> u32 {
        match self.race_start {
            Some(start) if now - start <= self.config.race_start_window => {
                ((value as f64) * self.config.race_start_multiplier).ceil() as u32
            }
            _ => value,
        }
    }

    fn evaluate(&self, now: DateTime<Utc>) -> Option<TripReport> {
        let latest = self.latest();
        let (random_events, spatial_events): (Vec<_>, Vec<_>) = latest
            .into_iter()
            .partition(|e| e.event_type == EventType::Random);

        let clusters: Vec<Cluster> = if self.config.proximity_enabled {
            cluster_by_proximity(spatial_events, self.config.proximity_distance)
        } else if spatial_events.is_empty() {
            Vec::new()
        } else {
            vec![Cluster {
                events: spatial_events,
            }]
        };

        let clusters = if clusters.is_empty() && !random_events.is_empty() {
            vec![Cluster { events: Vec::new() }]
        } else {
            clusters
        };

        for mut cluster in clusters {
            cluster.events.extend(random_events.iter().cloned());
            if let Some(report) = self.evaluate_cluster(&cluster, now) {
                return Some(report);
            }
        }
        None
    }

    fn evaluate_cluster(&self, cluster: &Cluster, now: DateTime<Utc>) -> Option<TripReport> {
        let mut counts: HashMap<EventType, u32> = HashMap::new();
        for event in &cluster.events {
            *counts.entry(event.event_type).or_insert(0) += 1;
        }

        for (event_type, threshold) in &self.config.per_type_thresholds {
            let scaled = self.scale(now, *threshold);
            if counts.get(event_type).copied().unwrap_or(0) >= scaled {
                return Some(TripReport {
                    reason: format!("{:?} threshold reached", event_type),
                    events: cluster.events.clone(),
                });
            }
        }

        // Accumulative: each driver contributes its single highest weight.
        let mut per_driver_weight: HashMap<Option<usize>, u32> = HashMap::new();
        for event in &cluster.events {
            let slot = event.driver.as_ref().map(|d| d.slot_index);
            let weight = self.config.weights.get(&event.event_type).copied().unwrap_or(0);
            per_driver_weight
                .entry(slot)
                .and_modify(|w| *w = (*w).max(weight))
                .or_insert(weight);
        }
        let sum: u32 = per_driver_weight.values().sum();
        let scaled_accumulative = self.scale(now, self.config.accumulative_threshold);
        if sum >= scaled_accumulative && !cluster.events.is_empty() {
            return Some(TripReport {
                reason: "accumulative threshold reached".to_string(),
                events: cluster.events.clone(),
            });
        }

        None
    }
}
