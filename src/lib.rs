//! Open-Meteo Pollen Library
//!
//! This module exposes the polling, classification and forecast components of
//! the pollen monitor for the daemon binary and for testing.

pub mod analytics;
pub mod api;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod pollen;
pub mod sensor;
pub mod traits;

// Re-export commonly used types
pub use analytics::{
    ForecastPoint, ForecastSummary, TrendDirection, build_forecast, determine_trend, round2,
};
pub use api::{PollenApiClient, Snapshot};
pub use config::AppConfig;
pub use coordinator::{CoordinatorState, PollCoordinator, PollHandle, RefreshOutcome};
pub use error::{FetchError, PollenError, UpdateFailed};
pub use pollen::{PollenKind, SeverityLevel, ThresholdTable, Thresholds, classify, rank};
pub use sensor::{PollenSensor, SensorState};
pub use traits::{Clock, MockClock, SnapshotFetcher, SystemClock};
