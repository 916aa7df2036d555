//! Supervisor: owns the telemetry connection, gates eligibility, and drives
//! the tick loop that wires Snapshotter -> Detectors -> Aggregator ->
//! Sequencer.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::aggregator::ThresholdAggregator;
use crate::detectors::{Detector, DetectorState};
use crate::sequencer::ProcedureSequencer;
use crate::signals::Latch;
use crate::telemetry::{SessionType, Snapshotter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupervisorState {
    Stopped,
    Connecting,
    Connected,
    AwaitingRaceSession,
    AwaitingGreen,
    Monitoring,
    CautionActive,
    Faulted,
}

#[derive(Debug, Clone)]
pub struct EligibilityConfig {
    pub earliest_minute: i64,
    pub latest_minute: i64,
    pub minimum_minutes_between: i64,
    pub max_cautions: u32,
}

impl Default for EligibilityConfig {
    fn default() -> Self {
        Self {
            earliest_minute: 0,
            latest_minute: i64::MAX,
            minimum_minutes_between: 0,
            max_cautions: u32::MAX,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct CautionCycleCounters {
    pub total_cautions: u32,
    pub last_trigger: Option<DateTime<Utc>>,
    pub lap_at_last_trigger: i32,
}

/// The coarse loop described in SPEC_FULL.md §4.5. Owns the Snapshotter,
/// the detector set, the aggregator, and the sequencer; exposes its state
/// as a read-only `watch::Receiver`.
pub struct Supervisor {
    snapshotter: Snapshotter,
    detectors: Vec<Box<dyn Detector>>,
    aggregator: ThresholdAggregator,
    sequencer: ProcedureSequencer,
    eligibility: EligibilityConfig,
    state_tx: watch::Sender<SupervisorState>,
    shutdown: CancellationToken,
    manual_trip: Latch,
    skip_wait_for_green: Latch,
    counters: CautionCycleCounters,
    race_start: Option<DateTime<Utc>>,
}

impl Supervisor {
    pub fn new(
        snapshotter: Snapshotter,
        detectors: Vec<Box<dyn Detector>>,
        aggregator: ThresholdAggregator,
        sequencer: ProcedureSequencer,
        eligibility: EligibilityConfig,
        shutdown: CancellationToken,
        manual_trip: Latch,
        skip_wait_for_green: Latch,
    ) -> Self {
        let (state_tx, _) = watch::channel(SupervisorState::Stopped);
        Self {
            snapshotter,
            detectors,
            aggregator,
            sequencer,
            eligibility,
            state_tx,
            shutdown,
            manual_trip,
            skip_wait_for_green,
            counters: CautionCycleCounters::default(),
            race_start: None,
        }
    }

    pub fn state_receiver(&self) -> watch::Receiver<SupervisorState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: SupervisorState) {
        info!(?state, "supervisor state transition");
        let _ = self.state_tx.send(state);
    }

    pub fn state(&self) -> SupervisorState {
        *self.state_tx.borrow()
    }

    /// Run the supervisor until shutdown is triggered or an unrecoverable
    /// fault occurs.
    pub async fn run(&mut self) {
        self.set_state(SupervisorState::Connecting);
        self.set_state(SupervisorState::Connected);
        self.set_state(SupervisorState::AwaitingRaceSession);

        if !self.wait_for_race_session().await {
            return;
        }
        self.set_state(SupervisorState::AwaitingGreen);

        if !self.wait_for_green().await {
            return;
        }
        self.race_start = Some(Utc::now());
        self.aggregator.set_race_start(self.race_start.unwrap());
        self.set_state(SupervisorState::Monitoring);
        info!("race_started");

        loop {
            if self.shutdown.is_cancelled() {
                self.set_state(SupervisorState::Stopped);
                return;
            }

            match self.tick().await {
                Ok(true) => self.run_caution_cycle().await,
                Ok(false) => {}
                Err(()) => {
                    self.set_state(SupervisorState::Faulted);
                    return;
                }
            }

            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        }
    }

    async fn wait_for_race_session(&mut self) -> bool {
        loop {
            if self.shutdown.is_cancelled() {
                self.set_state(SupervisorState::Stopped);
                return false;
            }
            match self.snapshotter.tick().await {
                Ok(pair) if pair.current.session_type == SessionType::Race => return true,
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "telemetry error while awaiting race session");
                }
            }
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        }
    }

    async fn wait_for_green(&mut self) -> bool {
        loop {
            if self.shutdown.is_cancelled() {
                self.set_state(SupervisorState::Stopped);
                return false;
            }
            if self.skip_wait_for_green.take() {
                return true;
            }
            match self.snapshotter.tick().await {
                Ok(pair) if pair.current.flags.is_green() => return true,
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "telemetry error while awaiting green");
                }
            }
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        }
    }

    /// One tick of the detection pipeline. Returns `Ok(true)` when a
    /// caution should begin this iteration.
    async fn tick(&mut self) -> Result<bool, ()> {
        let pair = match self.snapshotter.tick().await {
            Ok(pair) => pair,
            Err(e) => {
                debug!(error = %e, "transient telemetry error, skipping tick");
                return Ok(false);
            }
        };

        let manual = self.manual_trip.take();

        let now = Utc::now();
        let laps_since_start = pair.current.max_laps_completed();
        let detector_state = DetectorState {
            now,
            race_start: self.race_start,
            laps_since_start,
            supervisor_state: self.state(),
        };

        let mut events = Vec::new();
        for detector in &self.detectors {
            if detector.should_run(&detector_state) {
                events.extend(detector.detect(&pair));
            }
        }

        let trip = self.aggregator.tick(events, now);

        if manual {
            if self.counters.total_cautions >= self.eligibility.max_cautions {
                warn!("manual trip ignored: max_cautions reached");
                return Ok(false);
            }
            return Ok(true);
        }

        let Some(report) = trip else {
            return Ok(false);
        };

        if !self.is_eligible(now) {
            debug!(reason = %report.reason, "trip suppressed by eligibility gate");
            return Ok(false);
        }

        info!(reason = %report.reason, "threshold aggregator tripped");
        Ok(true)
    }

    fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        let Some(start) = self.race_start else {
            return false;
        };
        let minutes_since_start = (now - start).num_minutes();
        if minutes_since_start < self.eligibility.earliest_minute {
            return false;
        }
        if minutes_since_start > self.eligibility.latest_minute {
            return false;
        }
        if let Some(last) = self.counters.last_trigger {
            if (now - last) < Duration::minutes(self.eligibility.minimum_minutes_between) {
                return false;
            }
        }
        if self.counters.total_cautions >= self.eligibility.max_cautions {
            return false;
        }
        true
    }

    async fn run_caution_cycle(&mut self) {
        self.set_state(SupervisorState::CautionActive);
        self.aggregator.clear();

        let now = Utc::now();
        self.counters.total_cautions += 1;
        self.counters.last_trigger = Some(now);

        let message = "caution";
        if let Err(e) = self
            .sequencer
            .run(&mut self.snapshotter, message, &self.shutdown, || false)
            .await
        {
            error!(error = %e, "procedure sequencer failed");
        }

        if !self.shutdown.is_cancelled() {
            self.wait_for_green().await;
        }

        if self.shutdown.is_cancelled() {
            self.set_state(SupervisorState::Stopped);
        } else {
            self.set_state(SupervisorState::Monitoring);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::AggregatorConfig;
    use crate::detectors::StoppedDetector;
    use crate::sequencer::command_sink::RecordingCommandSink;
    use crate::sequencer::SequencerConfig;
    use crate::telemetry::MockTelemetrySource;

    fn build_supervisor(eligibility: EligibilityConfig) -> Supervisor {
        let source = Arc::new(MockTelemetrySource::new());
        let snapshotter = Snapshotter::new(source);
        let detectors: Vec<Box<dyn Detector>> = vec![Box::new(StoppedDetector::new(50))];
        let aggregator = ThresholdAggregator::new(AggregatorConfig::default());
        let sink = Arc::new(RecordingCommandSink::new());
        let sequencer = ProcedureSequencer::new(SequencerConfig::default(), sink);
        Supervisor::new(
            snapshotter,
            detectors,
            aggregator,
            sequencer,
            eligibility,
            CancellationToken::new(),
            Latch::new(),
            Latch::new(),
        )
    }

    #[test]
    fn ineligible_before_race_start_is_recorded() {
        let supervisor = build_supervisor(EligibilityConfig::default());
        assert!(!supervisor.is_eligible(Utc::now()));
    }

    #[test]
    fn eligible_within_window_after_race_start() {
        let mut supervisor = build_supervisor(EligibilityConfig::default());
        supervisor.race_start = Some(Utc::now() - Duration::minutes(5));
        assert!(supervisor.is_eligible(Utc::now()));
    }

    #[test]
    fn ineligible_before_earliest_minute() {
        let mut supervisor = build_supervisor(EligibilityConfig {
            earliest_minute: 10,
            ..EligibilityConfig::default()
        });
        supervisor.race_start = Some(Utc::now() - Duration::minutes(2));
        assert!(!supervisor.is_eligible(Utc::now()));
    }

    #[test]
    fn ineligible_after_latest_minute() {
        let mut supervisor = build_supervisor(EligibilityConfig {
            latest_minute: 10,
            ..EligibilityConfig::default()
        });
        supervisor.race_start = Some(Utc::now() - Duration::minutes(20));
        assert!(!supervisor.is_eligible(Utc::now()));
    }

    #[test]
    fn ineligible_within_minimum_spacing() {
        let mut supervisor = build_supervisor(EligibilityConfig::default());
        supervisor.race_start = Some(Utc::now() - Duration::minutes(30));
        supervisor.eligibility.minimum_minutes_between = 10;
        supervisor.counters.last_trigger = Some(Utc::now() - Duration::minutes(2));
        assert!(!supervisor.is_eligible(Utc::now()));
    }

    #[test]
    fn ineligible_once_max_cautions_reached() {
        let mut supervisor = build_supervisor(EligibilityConfig {
            max_cautions: 1,
            ..EligibilityConfig::default()
        });
        supervisor.race_start = Some(Utc::now() - Duration::minutes(5));
        supervisor.counters.total_cautions = 1;
        assert!(!supervisor.is_eligible(Utc::now()));
    }

    #[test]
    fn initial_state_is_stopped() {
        let supervisor = build_supervisor(EligibilityConfig::default());
        assert_eq!(supervisor.state(), SupervisorState::Stopped);
    }
}
