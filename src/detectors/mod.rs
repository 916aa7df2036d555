//! Detector capability: stateless-or-nearly-so probes over a snapshot pair.

pub mod off_track;
pub mod random;
pub mod stopped;

pub use off_track::OffTrackDetector;
pub use random::RandomDetector;
pub use stopped::StoppedDetector;

use chrono::{DateTime, Utc};

use crate::supervisor::SupervisorState;
use crate::telemetry::{Driver, SnapshotPair};

/// Closed enumeration of detection event types. Extending detection with a
/// new kind means adding a variant here and a weight/threshold entry in
/// configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventType {
    Random,
    Stopped,
    OffTrack,
}

/// A single detection: the event type, the offending driver (absent for a
/// random trip, which has no driver), and the wall-clock time observed.
#[derive(Debug, Clone)]
pub struct DetectionEvent {
    pub event_type: EventType,
    pub driver: Option<Driver>,
    pub timestamp: DateTime<Utc>,
}

impl DetectionEvent {
    pub fn key(&self) -> (Option<usize>, EventType) {
        (self.driver.as_ref().map(|d| d.slot_index), self.event_type)
    }
}

/// Bundles everything a detector's `should_run` needs to decide whether it
/// is in its eligibility window, without coupling it to the full supervisor.
#[derive(Debug, Clone)]
pub struct DetectorState {
    pub now: DateTime<Utc>,
    pub race_start: Option<DateTime<Utc>>,
    pub laps_since_start: i32,
    pub supervisor_state: SupervisorState,
}

/// Uniform capability implemented by every detector.
pub trait Detector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this detector should run at all this tick, given the current
    /// eligibility window. Detectors that are unconditionally active (e.g.
    /// off-track) always return `true`.
    fn should_run(&self, state: &DetectorState) -> bool;

    /// Inspect the snapshot pair and emit zero or more detection events.
    fn detect(&self, pair: &SnapshotPair) -> Vec<DetectionEvent>;
}
