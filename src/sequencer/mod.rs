//! Procedure sequencer: drives the multi-phase caution procedure once the
//! supervisor decides to trip.

pub mod command_sink;
pub mod wave_strategy;

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use command_sink::{CommandSink, CommandSinkError};
use wave_strategy::{compute_wave_order, distance_behind_pace_car, WaveStrategy};

use crate::telemetry::Snapshotter;

#[derive(Debug, thiserror::Error)]
pub enum SequencerError {
    #[error("command sink error: {0}")]
    CommandSink(#[from] CommandSinkError),

    #[error("shutdown requested mid-procedure")]
    ShutdownRequested,
}

#[derive(Debug, Clone)]
pub struct SequencerConfig {
    pub wave_strategy: WaveStrategy,
    pub laps_before_wave_arounds: i32,
    pub laps_under_safety_car: i32,
    pub class_split_enabled: bool,
    pub command_delay: Duration,
    pub chat_settle_delay: Duration,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            wave_strategy: WaveStrategy::Combined,
            laps_before_wave_arounds: 0,
            laps_under_safety_car: 3,
            class_split_enabled: false,
            command_delay: Duration::from_millis(500),
            chat_settle_delay: Duration::from_millis(100),
        }
    }
}

pub struct ProcedureSequencer {
    config: SequencerConfig,
    sink: Arc<dyn CommandSink>,
}

impl ProcedureSequencer {
    pub fn new(config: SequencerConfig, sink: Arc<dyn CommandSink>) -> Self {
        Self { config, sink }
    }

    /// Run the full procedure: yellow, wave-arounds, optional class split,
    /// pace-lap countdown. Returns once the hand-off phase is reached; the
    /// supervisor is responsible for waiting on the green-flag transition.
    pub async fn run(
        &self,
        snapshotter: &mut Snapshotter,
        message: &str,
        shutdown: &CancellationToken,
        class_split_confirmed: impl Fn() -> bool,
    ) -> Result<(), SequencerError> {
        self.phase_yellow(message).await?;
        let l0 = self.current_max_laps(snapshotter).await?;

        self.phase_wave_arounds(snapshotter, l0, shutdown).await?;

        if self.config.class_split_enabled && class_split_confirmed() {
            self.phase_class_split(snapshotter, shutdown).await?;
        }

        self.phase_pace_laps(snapshotter, l0, shutdown).await?;

        info!("caution procedure hand-off complete");
        Ok(())
    }

    async fn current_max_laps(&self, snapshotter: &mut Snapshotter) -> Result<i32, SequencerError> {
        let pair = snapshotter.tick().await.map_err(|_| SequencerError::ShutdownRequested)?;
        Ok(pair.current.max_laps_completed())
    }

    async fn phase_yellow(&self, message: &str) -> Result<(), SequencerError> {
        self.sink.send(&format!("!y {message}")).await?;
        tokio::time::sleep(self.config.chat_settle_delay).await;
        Ok(())
    }

    async fn phase_wave_arounds(
        &self,
        snapshotter: &mut Snapshotter,
        l0: i32,
        shutdown: &CancellationToken,
    ) -> Result<(), SequencerError> {
        let k = self.config.laps_before_wave_arounds;
        loop {
            if shutdown.is_cancelled() {
                return Err(SequencerError::ShutdownRequested);
            }
            let pair = snapshotter
                .tick()
                .await
                .map_err(|_| SequencerError::ShutdownRequested)?;
            if pair.current.max_laps_completed() >= l0 + k + 1 {
                let pace_progress = pair
                    .current
                    .pace_car
                    .as_ref()
                    .map(|p| p.composite_progress())
                    .unwrap_or(0.0);
                let ordered =
                    compute_wave_order(&pair.current, pace_progress, self.config.wave_strategy);
                for driver in ordered {
                    if shutdown.is_cancelled() {
                        return Err(SequencerError::ShutdownRequested);
                    }
                    self.sink.send(&format!("!w {}", driver.car_number)).await?;
                    tokio::time::sleep(self.config.command_delay).await;
                }
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn phase_class_split(
        &self,
        snapshotter: &mut Snapshotter,
        shutdown: &CancellationToken,
    ) -> Result<(), SequencerError> {
        let pair = snapshotter
            .tick()
            .await
            .map_err(|_| SequencerError::ShutdownRequested)?;
        let pace_progress = pair
            .current
            .pace_car
            .as_ref()
            .map(|p| p.composite_progress())
            .unwrap_or(0.0);

        let mut by_class_fastest_first: Vec<u32> = pair
            .current
            .drivers
            .iter()
            .map(|d| d.class_id)
            .collect::<std::collections::HashSet<_>>()
            .into_iter()
            .collect();
        by_class_fastest_first.sort();

        let mut ordered_grid: Vec<_> = pair.current.drivers.clone();
        ordered_grid.sort_by(|a, b| {
            distance_behind_pace_car(pace_progress, a)
                .partial_cmp(&distance_behind_pace_car(pace_progress, b))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut best_class_seen_rank: Option<usize> = None;
        for (rank, driver) in ordered_grid.iter().enumerate() {
            let desired_rank = by_class_fastest_first
                .iter()
                .position(|c| *c == driver.class_id)
                .unwrap_or(usize::MAX);
            if let Some(seen) = best_class_seen_rank {
                if desired_rank > seen {
                    if shutdown.is_cancelled() {
                        return Err(SequencerError::ShutdownRequested);
                    }
                    self.sink.send(&format!("!eol {}", driver.car_number)).await?;
                    tokio::time::sleep(self.config.command_delay).await;
                    continue;
                }
            }
            let _ = rank;
            best_class_seen_rank = Some(best_class_seen_rank.map_or(desired_rank, |s| s.min(desired_rank)));
        }
        Ok(())
    }

    async fn phase_pace_laps(
        &self,
        snapshotter: &mut Snapshotter,
        l0: i32,
        shutdown: &CancellationToken,
    ) -> Result<(), SequencerError> {
        loop {
            if shutdown.is_cancelled() {
                return Err(SequencerError::ShutdownRequested);
            }
            let pair = snapshotter
                .tick()
                .await
                .map_err(|_| SequencerError::ShutdownRequested)?;
            let leader_progress = pair.current.leader().map(|d| d.lap_progress).unwrap_or(0.0);
            if pair.current.max_laps_completed() >= l0 + 2 && leader_progress > 0.5 {
                let n = (self.config.laps_under_safety_car - 1).max(0);
                self.sink.send(&format!("!p {n}")).await?;
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
