//! Supervisory caution-detection-and-procedure controller for sim-racing
//! telemetry.
//!
//! - **telemetry**: driver vocabulary, pollable sources, double-buffered
//!   snapshots
//! - **detectors**: per-tick probes (random, stopped, off-track) over a
//!   snapshot pair
//! - **aggregator**: sliding-window threshold evaluation with proximity
//!   clustering
//! - **sequencer**: the multi-phase caution procedure and its command sink
//! - **supervisor**: the state machine gating and driving the tick loop
//! - **config**: CLI/environment configuration surface
//! - **signals**: cross-task shutdown/manual-trip/skip-wait-for-green
//!   primitives
//! - **app**: top-level orchestrator wiring everything together

pub mod aggregator;
pub mod app;
pub mod config;
pub mod detectors;
pub mod sequencer;
pub mod signals;
pub mod supervisor;
pub mod telemetry;

pub use app::App;
pub use config::Config;
pub use supervisor::{Supervisor, SupervisorState};
