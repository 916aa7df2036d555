//! Telemetry source abstraction: a pollable, read-only view of the sim.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::{debug, warn};

use super::driver::{Driver, SessionFlags, SessionType};

/// Errors surfaced by a telemetry source.
#[derive(Debug, thiserror::Error)]
pub enum TelemetrySourceError {
    #[error("telemetry source has no more samples")]
    Exhausted,

    #[error("failed to connect to simulator: {0}")]
    ConnectionError(String),
}

/// One raw read from the telemetry source: everything the Snapshotter needs
/// to build a `Snapshot` for one tick.
#[derive(Debug, Clone)]
pub struct RawSample {
    pub timestamp: DateTime<Utc>,
    pub session_type: SessionType,
    pub flags: SessionFlags,
    pub drivers: Vec<Driver>,
}

impl RawSample {
    pub fn pace_car(&self) -> Option<&Driver> {
        self.drivers.iter().find(|d| d.is_pace_car)
    }
}

/// Abstract, pollable telemetry source. A live connection to a simulator's
/// shared-memory telemetry is out of scope for this crate's bundled
/// implementations, but is expressible behind this same trait without
/// touching any caller.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Read the next sample. Returns `Ok(None)` when the source has nothing
    /// new this tick (a transient gap, not a failure).
    async fn sample(&self) -> Result<Option<RawSample>, TelemetrySourceError>;
}

/// In-memory telemetry source fed by test or demonstration code. Samples are
/// pushed in and consumed in FIFO order; an empty queue yields `Ok(None)`
/// rather than erroring, matching a transient telemetry gap.
pub struct MockTelemetrySource {
    queue: Mutex<VecDeque<RawSample>>,
}

impl MockTelemetrySource {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, sample: RawSample) {
        self.queue
            .lock()
            .expect("mock telemetry queue poisoned")
            .push_back(sample);
    }

    pub fn push_many(&self, samples: impl IntoIterator<Item = RawSample>) {
        let mut q = self.queue.lock().expect("mock telemetry queue poisoned");
        q.extend(samples);
    }
}

impl Default for MockTelemetrySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TelemetrySource for MockTelemetrySource {
    async fn sample(&self) -> Result<Option<RawSample>, TelemetrySourceError> {
        let next = self
            .queue
            .lock()
            .expect("mock telemetry queue poisoned")
            .pop_front();
        Ok(next)
    }
}

/// Replays a recorded sequence of samples at a configurable playback rate,
/// mirroring the sibling client's IBT-replay telemetry source. `speed` is a
/// multiplier on the recorded inter-sample spacing; a speed of `0.0` (or any
/// non-finite value) disables the delay entirely, which test code relies on
/// to run scenarios without real wall-clock waits.
pub struct ReplayTelemetrySource {
    samples: Mutex<VecDeque<RawSample>>,
    speed: f64,
}

impl ReplayTelemetrySource {
    pub fn new(samples: Vec<RawSample>, speed: f64) -> Self {
        debug!(count = samples.len(), speed, "loaded replay samples");
        Self {
            samples: Mutex::new(samples.into()),
            speed,
        }
    }
}

#[async_trait]
impl TelemetrySource for ReplayTelemetrySource {
    async fn sample(&self) -> Result<Option<RawSample>, TelemetrySourceError> {
        let next = self
            .samples
            .lock()
            .expect("replay telemetry queue poisoned")
            .pop_front();

        if next.is_none() {
            warn!("replay source exhausted");
        }

        if self.speed > 0.0 && self.speed.is_finite() {
            let delay = std::time::Duration::from_secs_f64(1.0 / (self.speed * 60.0).max(1.0));
            tokio::time::sleep(delay).await;
        }

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::driver::SurfaceClass;

    fn sample_at(laps: i32) -> RawSample {
        RawSample {
            timestamp: Utc::now(),
            session_type: SessionType::Race,
            flags: SessionFlags::GREEN,
            drivers: vec![Driver {
                slot_index: 1,
                car_number: "12".into(),
                class_id: 0,
                is_pace_car: false,
                laps_completed: laps,
                lap_progress: 0.1,
                surface: SurfaceClass::OnTrack,
                on_pit_road: false,
            }],
        }
    }

    #[tokio::test]
    async fn mock_source_yields_none_when_empty() {
        let source = MockTelemetrySource::new();
        assert!(source.sample().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mock_source_is_fifo() {
        let source = MockTelemetrySource::new();
        source.push(sample_at(1));
        source.push(sample_at(2));

        let first = source.sample().await.unwrap().unwrap();
        let second = source.sample().await.unwrap().unwrap();
        assert_eq!(first.drivers[0].laps_completed, 1);
        assert_eq!(second.drivers[0].laps_completed, 2);
    }

    #[tokio::test]
    async fn replay_source_with_zero_speed_has_no_delay() {
        let source = ReplayTelemetrySource::new(vec![sample_at(1)], 0.0);
        let got = source.sample().await.unwrap();
        assert!(got.is_some());
        let none = source.sample().await.unwrap();
        assert!(none.is_none());
    }
}
