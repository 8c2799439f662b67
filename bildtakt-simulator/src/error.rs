use bildtakt_engine::SyncError;
use bildtakt_telemetry::MetricsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Frame delivery failed: {0}")]
    Sync(#[from] SyncError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] MetricsError),

    #[error("Invalid producer configuration: {0}")]
    InvalidConfig(String),
}
