//! Double-buffered snapshots: the only state a detector needs.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

use super::driver::{Driver, SessionFlags, SessionType};
use super::source::{RawSample, TelemetrySource, TelemetrySourceError};

/// One tick's worth of fleet state: every eligible driver plus the pace car,
/// kept out of band because the sequencer needs it for wave-around ordering.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub session_type: SessionType,
    pub flags: SessionFlags,
    pub drivers: Vec<Driver>,
    pub pace_car: Option<Driver>,
}

impl Snapshot {
    fn empty(now: DateTime<Utc>) -> Self {
        Self {
            timestamp: now,
            session_type: SessionType::Other,
            flags: SessionFlags::empty(),
            drivers: Vec::new(),
            pace_car: None,
        }
    }

    fn from_raw(raw: RawSample) -> Self {
        let pace_car = raw.pace_car().cloned();
        let drivers = raw
            .drivers
            .into_iter()
            .filter(|d| d.is_eligible())
            .collect();

        Self {
            timestamp: raw.timestamp,
            session_type: raw.session_type,
            flags: raw.flags,
            drivers,
            pace_car,
        }
    }

    pub fn max_laps_completed(&self) -> i32 {
        self.drivers
            .iter()
            .filter(|d| !d.on_pit_road)
            .map(|d| d.laps_completed)
            .max()
            .unwrap_or(0)
    }

    pub fn leader(&self) -> Option<&Driver> {
        self.drivers
            .iter()
            .max_by(|a, b| {
                a.composite_progress()
                    .partial_cmp(&b.composite_progress())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }
}

/// Current/previous pair, rebuilt wholesale every tick. On the first tick
/// `previous` equals `current`, so no deltas are observable yet.
#[derive(Debug, Clone)]
pub struct SnapshotPair {
    pub previous: Snapshot,
    pub current: Snapshot,
}

/// Owns the telemetry source and produces one `SnapshotPair` per tick.
pub struct Snapshotter {
    source: Arc<dyn TelemetrySource>,
    last: Option<Snapshot>,
}

impl Snapshotter {
    pub fn new(source: Arc<dyn TelemetrySource>) -> Self {
        Self { source, last: None }
    }

    /// Produce the next snapshot pair. If telemetry is transiently
    /// unavailable, returns an empty current snapshot paired with whatever
    /// was last observed, so callers can skip detection this iteration
    /// without losing the delta baseline.
    pub async fn tick(&mut self) -> Result<SnapshotPair, TelemetrySourceError> {
        let now = Utc::now();

        let current = match self.source.sample().await? {
            Some(raw) => Snapshot::from_raw(raw),
            None => {
                debug!("telemetry source returned no sample this tick");
                Snapshot::empty(now)
            }
        };

        // On the first tick there is no prior observation, so previous is
        // seeded from current rather than an empty snapshot: no deltas are
        // observable yet, but drivers are present from tick one.
        let previous = self.last.clone().unwrap_or_else(|| current.clone());

        self.last = Some(current.clone());
        Ok(SnapshotPair { previous, current })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::driver::SurfaceClass;
    use crate::telemetry::source::MockTelemetrySource;

    fn driver(slot: usize, laps: i32, progress: f64) -> Driver {
        Driver {
            slot_index: slot,
            car_number: slot.to_string(),
            class_id: 0,
            is_pace_car: false,
            laps_completed: laps,
            lap_progress: progress,
            surface: SurfaceClass::OnTrack,
            on_pit_road: false,
        }
    }

    #[tokio::test]
    async fn first_tick_has_equal_previous_and_current() {
        let source = Arc::new(MockTelemetrySource::new());
        source.push(RawSample {
            timestamp: Utc::now(),
            session_type: SessionType::Race,
            flags: SessionFlags::GREEN,
            drivers: vec![driver(1, 3, 0.1)],
        });
        let mut snapshotter = Snapshotter::new(source);
        let pair = snapshotter.tick().await.unwrap();
        assert_eq!(pair.previous.drivers.len(), pair.current.drivers.len());
        assert_eq!(pair.current.drivers[0].laps_completed, 3);
    }

    #[tokio::test]
    async fn empty_sample_yields_empty_current_snapshot() {
        let source = Arc::new(MockTelemetrySource::new());
        let mut snapshotter = Snapshotter::new(source);
        let pair = snapshotter.tick().await.unwrap();
        assert!(pair.current.drivers.is_empty());
    }

    #[tokio::test]
    async fn pace_car_is_excluded_from_drivers_but_kept_out_of_band() {
        let source = Arc::new(MockTelemetrySource::new());
        let mut pace = driver(0, 3, 0.1);
        pace.is_pace_car = true;
        source.push(RawSample {
            timestamp: Utc::now(),
            session_type: SessionType::Race,
            flags: SessionFlags::GREEN,
            drivers: vec![pace, driver(1, 3, 0.2)],
        });
        let mut snapshotter = Snapshotter::new(source);
        let pair = snapshotter.tick().await.unwrap();
        assert_eq!(pair.current.drivers.len(), 1);
        assert!(pair.current.pace_car.is_some());
    }

    #[test]
    fn leader_is_highest_composite_progress() {
        let snap = Snapshot {
            timestamp: Utc::now(),
            session_type: SessionType::Race,
            flags: SessionFlags::GREEN,
            drivers: vec![driver(1, 3, 0.9), driver(2, 4, 0.1)],
            pace_car: None,
        };
        assert_eq!(snap.leader().unwrap().slot_index, 2);
    }
}
