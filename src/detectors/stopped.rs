//! Stopped detector: flags drivers whose composite progress hasn't moved
//! between ticks.

use chrono::Utc;
use std::collections::HashMap;
use tracing::warn;

use super::{DetectionEvent, Detector, DetectorState, EventType};
use crate::telemetry::SnapshotPair;

pub struct StoppedDetector {
    /// If more than this many drivers appear stopped in a single tick, the
    /// tick is treated as a telemetry stall rather than a real pile-up, and
    /// no events are emitted.
    lag_threshold: usize,
}

impl StoppedDetector {
    pub fn new(lag_threshold: usize) -> Self {
        Self { lag_threshold }
    }
}

impl Detector for StoppedDetector {
    fn name(&self) -> &'static str {
        "stopped"
    }

    fn should_run(&self, _state: &DetectorState) -> bool {
        true
    }

    fn detect(&self, pair: &SnapshotPair) -> Vec<DetectionEvent> {
        let previous_by_slot: HashMap<usize, f64> = pair
            .previous
            .drivers
            .iter()
            .map(|d| (d.slot_index, d.composite_progress()))
            .collect();

        let now = Utc::now();
        let candidates: Vec<_> = pair
            .current
            .drivers
            .iter()
            .filter(|d| !d.surface.is_on_pit_road() && !d.on_pit_road)
            .filter_map(|d| {
                previous_by_slot
                    .get(&d.slot_index)
                    .filter(|&&prev| prev == d.composite_progress())
                    .map(|_| d)
            })
            .collect();

        if candidates.len() > self.lag_threshold {
            warn!(
                count = candidates.len(),
                threshold = self.lag_threshold,
                "suppressing stopped events: suspected telemetry stall"
            );
            return Vec::new();
        }

        candidates
            .into_iter()
            .map(|d| DetectionEvent {
                event_type: EventType::Stopped,
                driver: Some(d.clone()),
                timestamp: now,
            })
            .collect()
    }
}
