//! Telemetry module: driver vocabulary, sources, and per-tick snapshots.

pub mod driver;
pub mod snapshot;
pub mod source;

pub use driver::{Driver, SessionFlags, SessionType, SurfaceClass};
pub use snapshot::{Snapshot, SnapshotPair, Snapshotter};
pub use source::{MockTelemetrySource, RawSample, ReplayTelemetrySource, TelemetrySource, TelemetrySourceError};
