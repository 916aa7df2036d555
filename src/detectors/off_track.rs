//! Off-track detector: flags drivers off the racing surface and not in
//! the pits.

use chrono::Utc;

use super::{DetectionEvent, Detector, DetectorState, EventType};
use crate::telemetry::{SnapshotPair, SurfaceClass};

pub struct OffTrackDetector;

impl OffTrackDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OffTrackDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for OffTrackDetector {
    fn name(&self) -> &'static str {
        "off_track"
    }

    fn should_run(&self, _state: &DetectorState) -> bool {
        true
    }

    fn detect(&self, pair: &SnapshotPair) -> Vec<DetectionEvent> {
        let now = Utc::now();
        pair.current
            .drivers
            .iter()
            .filter(|d| d.surface == SurfaceClass::OffTrack && !d.on_pit_road)
            .map(|d| DetectionEvent {
                event_type: EventType::OffTrack,
                driver: Some(d.clone()),
                timestamp: now,
            })
            .collect()
    }
}
