//! Configuration surface: CLI flags layered over environment variables,
//! validated once at startup into a typed, immutable `Config`.

use clap::Parser;
use std::path::PathBuf;

use crate::sequencer::wave_strategy::WaveStrategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaveStrategyArg {
    LappedCars,
    AheadOfClassLead,
    #[default]
    Combined,
}

impl std::str::FromStr for WaveStrategyArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lapped-cars" | "lapped_cars" => Ok(WaveStrategyArg::LappedCars),
            "ahead-of-class-lead" | "ahead_of_class_lead" => Ok(WaveStrategyArg::AheadOfClassLead),
            "combined" => Ok(WaveStrategyArg::Combined),
            _ => Err(format!(
                "invalid wave strategy: {s}. use 'lapped-cars', 'ahead-of-class-lead', or 'combined'"
            )),
        }
    }
}

impl std::fmt::Display for WaveStrategyArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WaveStrategyArg::LappedCars => write!(f, "lapped-cars"),
            WaveStrategyArg::AheadOfClassLead => write!(f, "ahead-of-class-lead"),
            WaveStrategyArg::Combined => write!(f, "combined"),
        }
    }
}

impl From<WaveStrategyArg> for WaveStrategy {
    fn from(arg: WaveStrategyArg) -> Self {
        match arg {
            WaveStrategyArg::LappedCars => WaveStrategy::LappedCars,
            WaveStrategyArg::AheadOfClassLead => WaveStrategy::AheadOfClassLead,
            WaveStrategyArg::Combined => WaveStrategy::Combined,
        }
    }
}

/// Replay-vs-mock telemetry source selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TelemetryMode {
    #[default]
    Replay,
    Mock,
}

impl std::str::FromStr for TelemetryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "replay" => Ok(TelemetryMode::Replay),
            "mock" => Ok(TelemetryMode::Mock),
            _ => Err(format!("invalid telemetry mode: {s}. use 'replay' or 'mock'")),
        }
    }
}

impl std::fmt::Display for TelemetryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TelemetryMode::Replay => write!(f, "replay"),
            TelemetryMode::Mock => write!(f, "mock"),
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "caution-marshal", about = "Supervisory caution-detection controller")]
pub struct CliArgs {
    /// Telemetry source mode
    #[arg(long, env = "CM_TELEMETRY_MODE", default_value_t = TelemetryMode::Replay)]
    pub telemetry_mode: TelemetryMode,

    /// Recorded sample file for replay mode
    #[arg(long, env = "CM_REPLAY_FILE")]
    pub replay_file: Option<PathBuf>,

    /// Replay playback speed multiplier
    #[arg(long, env = "CM_PLAYBACK_SPEED", default_value_t = 1.0)]
    pub playback_speed: f64,

    /// Enable the random detector
    #[arg(long, env = "CM_RANDOM_ENABLED", default_value_t = false)]
    pub random_enabled: bool,

    /// Per-tick probability the random detector trips
    #[arg(long, env = "CM_RANDOM_PROBABILITY", default_value_t = 0.0)]
    pub random_probability: f64,

    /// Maximum attempted random trips per session (unset = unlimited)
    #[arg(long, env = "CM_RANDOM_MAX_OCCURRENCES")]
    pub random_max_occurrences: Option<u32>,

    /// Enable the stopped-car detector
    #[arg(long, env = "CM_STOPPED_ENABLED", default_value_t = true)]
    pub stopped_enabled: bool,

    /// Lag threshold for the stopped-car telemetry-stall guard
    #[arg(long, env = "CM_STOPPED_LAG_THRESHOLD", default_value_t = 20)]
    pub stopped_lag_threshold: usize,

    /// Enable the off-track detector
    #[arg(long, env = "CM_OFF_TRACK_ENABLED", default_value_t = true)]
    pub off_track_enabled: bool,

    /// Stopped-event per-type threshold
    #[arg(long, env = "CM_THRESHOLD_STOPPED", default_value_t = 2)]
    pub threshold_stopped: u32,

    /// Off-track-event per-type threshold
    #[arg(long, env = "CM_THRESHOLD_OFF_TRACK", default_value_t = 3)]
    pub threshold_off_track: u32,

    /// Random-event per-type threshold
    #[arg(long, env = "CM_THRESHOLD_RANDOM", default_value_t = 1)]
    pub threshold_random: u32,

    /// Stopped-event accumulative weight
    #[arg(long, env = "CM_WEIGHT_STOPPED", default_value_t = 2)]
    pub weight_stopped: u32,

    /// Off-track-event accumulative weight
    #[arg(long, env = "CM_WEIGHT_OFF_TRACK", default_value_t = 1)]
    pub weight_off_track: u32,

    /// Random-event accumulative weight
    #[arg(long, env = "CM_WEIGHT_RANDOM", default_value_t = 4)]
    pub weight_random: u32,

    /// Accumulative threshold
    #[arg(long, env = "CM_ACCUMULATIVE_THRESHOLD", default_value_t = 4)]
    pub accumulative_threshold: u32,

    /// Aggregator sliding-window length, in seconds
    #[arg(long, env = "CM_WINDOW_SECONDS", default_value_t = 5)]
    pub window_seconds: i64,

    /// Enable proximity clustering
    #[arg(long, env = "CM_PROXIMITY_ENABLED", default_value_t = false)]
    pub proximity_enabled: bool,

    /// Proximity clustering distance, in lap-fractions
    #[arg(long, env = "CM_PROXIMITY_DISTANCE", default_value_t = 0.05)]
    pub proximity_distance: f64,

    /// Threshold multiplier applied near race start
    #[arg(long, env = "CM_RACE_START_MULTIPLIER", default_value_t = 1.0)]
    pub race_start_multiplier: f64,

    /// Window after race start during which the multiplier applies, seconds
    #[arg(long, env = "CM_RACE_START_MULTIPLIER_SECONDS", default_value_t = 0)]
    pub race_start_multiplier_seconds: i64,

    /// Maximum cautions per session
    #[arg(long, env = "CM_MAX_CAUTIONS", default_value_t = 10)]
    pub max_cautions: u32,

    /// Earliest eligible minute for an automatic caution
    #[arg(long, env = "CM_EARLIEST_MINUTE", default_value_t = 0)]
    pub earliest_minute: i64,

    /// Latest eligible minute for an automatic caution
    #[arg(long, env = "CM_LATEST_MINUTE", default_value_t = i64::MAX)]
    pub latest_minute: i64,

    /// Minimum minutes between automatic cautions
    #[arg(long, env = "CM_MINIMUM_MINUTES_BETWEEN", default_value_t = 3)]
    pub minimum_minutes_between: i64,

    /// Laps to wait after yellow before dispatching wave-arounds
    #[arg(long, env = "CM_LAPS_BEFORE_WAVE_AROUNDS", default_value_t = 0)]
    pub laps_before_wave_arounds: i32,

    /// Laps to run under safety car before resuming
    #[arg(long, env = "CM_LAPS_UNDER_SAFETY_CAR", default_value_t = 3)]
    pub laps_under_safety_car: i32,

    /// Wave-around selection strategy
    #[arg(long, env = "CM_WAVE_STRATEGY", default_value_t = WaveStrategyArg::Combined)]
    pub wave_strategy: WaveStrategyArg,

    /// Enable class-split re-ordering
    #[arg(long, env = "CM_CLASS_SPLIT_ENABLED", default_value_t = false)]
    pub class_split_enabled: bool,

    /// Log level filter, forwarded to `RUST_LOG` if it is unset
    #[arg(long, env = "CM_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("replay mode requires --replay-file")]
    MissingReplayFile,

    #[error("replay file not found: {0}")]
    ReplayFileNotFound(PathBuf),

    #[error("invalid playback speed: {0} (must be > 0)")]
    InvalidPlaybackSpeed(f64),

    #[error("invalid probability: {0} (must be within [0, 1])")]
    InvalidProbability(f64),

    #[error("invalid proximity distance: {0} (must be within (0, 1])")]
    InvalidProximityDistance(f64),

    #[error("other configuration error: {0}")]
    Other(String),
}

/// Fully validated, immutable configuration. Built once at process start;
/// the supervisor reads it once per caution-cycle start so a concurrently
/// mutated config (impossible here, since this value never changes after
/// construction) cannot perturb an in-flight procedure.
#[derive(Debug, Clone)]
pub struct Config {
    pub args: CliArgs,
}

impl Config {
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        Self::validate(&args)?;
        Ok(Self { args })
    }

    /// Load `.env` (if present), then parse CLI args/environment, then
    /// validate.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let args = CliArgs::parse();
        Self::from_args(args)
    }

    fn validate(args: &CliArgs) -> Result<(), ConfigError> {
        if args.telemetry_mode == TelemetryMode::Replay {
            let path = args
                .replay_file
                .as_ref()
                .ok_or(ConfigError::MissingReplayFile)?;
            if !path.exists() {
                return Err(ConfigError::ReplayFileNotFound(path.clone()));
            }
        }

        if args.playback_speed <= 0.0 {
            return Err(ConfigError::InvalidPlaybackSpeed(args.playback_speed));
        }

        if !(0.0..=1.0).contains(&args.random_probability) {
            return Err(ConfigError::InvalidProbability(args.random_probability));
        }

        if args.proximity_enabled && !(0.0..=1.0).contains(&args.proximity_distance) {
            return Err(ConfigError::InvalidProximityDistance(args.proximity_distance));
        }

        Ok(())
    }
}
