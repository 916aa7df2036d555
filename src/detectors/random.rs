//! Random detector: an occasional, driverless trip used to exercise the
//! caution procedure independent of any observable on-track condition.

use chrono::Utc;
use rand::Rng;
use std::sync::atomic::{AtomicI64, Ordering};

use super::{DetectionEvent, Detector, DetectorState, EventType};
use crate::telemetry::SnapshotPair;

/// Budget is tracked as a soft cap on *attempted* trips (see DESIGN.md); a
/// negative budget means unlimited.
const UNLIMITED: i64 = -1;

pub struct RandomDetector {
    enabled: bool,
    probability: f64,
    remaining: AtomicI64,
}

impl RandomDetector {
    pub fn new(enabled: bool, probability: f64, max_occurrences: Option<u32>) -> Self {
        Self {
            enabled,
            probability: probability.clamp(0.0, 1.0),
            remaining: AtomicI64::new(max_occurrences.map(|n| n as i64).unwrap_or(UNLIMITED)),
        }
    }

    fn has_budget(&self) -> bool {
        self.remaining.load(Ordering::SeqCst) != 0
    }

    fn consume_budget(&self) {
        let current = self.remaining.load(Ordering::SeqCst);
        if current > 0 {
            self.remaining.store(current - 1, Ordering::SeqCst);
        }
    }
}

impl Detector for RandomDetector {
    fn name(&self) -> &'static str {
        "random"
    }

    fn should_run(&self, _state: &DetectorState) -> bool {
        self.enabled && self.has_budget()
    }

    fn detect(&self, _pair: &SnapshotPair) -> Vec<DetectionEvent> {
        if !self.enabled || !self.has_budget() {
            return Vec::new();
        }

        let roll: f64 = rand::rng().random();
        if roll < self.probability {
            self.consume_budget();
            vec![DetectionEvent {
                event_type: EventType::Random,
                driver: None,
                timestamp: Utc::now(),
            }]
        } else {
            Vec::new()
        }
    }
}
