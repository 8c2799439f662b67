use bildtakt_config::ConfigError;
use bildtakt_simulator::SimulationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error("Simulation task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Could not render statistics: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Presentation digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },
}
