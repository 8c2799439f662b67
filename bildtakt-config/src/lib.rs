//! # bildtakt Configuration System
//!
//! Hierarchical configuration for the frame synchronization engine, the
//! simulated producer and telemetry.
//!
//! ## Features
//! - **Unified Configuration**: one document covers engine, producer and telemetry
//! - **Validation**: sentinel timing values are normalized, then range checks run before anything starts
//! - **Environment Awareness**: `BILDTAKT_ENV` selects an override file, `BILDTAKT_*` variables win last

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod error;
mod producer;
mod sync;
mod telemetry;
mod validation;

pub use error::ConfigError;
pub use producer::ProducerConfig;
pub use sync::SyncConfig;
pub use telemetry::{MetricsConfig, TelemetryConfig};

/// Base configuration file, relative to the working directory.
pub const BASE_CONFIG_PATH: &str = "config/bildtakt.yaml";

/// Top-level configuration container.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone)]
pub struct BildtaktConfig {
    /// Delivery mode and its timing parameters.
    #[validate(nested)]
    #[serde(default)]
    pub sync: SyncConfig,

    /// Simulated producer used by the CLI and tests.
    #[validate(nested)]
    #[serde(default)]
    pub producer: ProducerConfig,

    /// Logging and metrics.
    #[validate(nested)]
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl BildtaktConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default values
    /// 2. `config/bildtakt.yaml`, if present
    /// 3. `config/<BILDTAKT_ENV>.yaml`, if present (`BILDTAKT_ENV` defaults to `development`)
    /// 4. `BILDTAKT_*` environment variables, `__` separating nested keys
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(BildtaktConfig::default()));

        if Path::new(BASE_CONFIG_PATH).exists() {
            figment = figment.merge(Yaml::file(BASE_CONFIG_PATH));
        }

        let env = std::env::var("BILDTAKT_ENV").unwrap_or_else(|_| "development".into());
        let env_file = format!("config/{}.yaml", env);
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(env_file));
        }

        Self::extract_validated(figment.merge(Env::prefixed("BILDTAKT_").split("__")))
    }

    /// Load configuration from a specific file, layered over defaults and
    /// under `BILDTAKT_*` environment variables.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        Self::extract_validated(
            Figment::from(Serialized::defaults(BildtaktConfig::default()))
                .merge(Yaml::file(path))
                .merge(Env::prefixed("BILDTAKT_").split("__")),
        )
    }

    /// Normalizes and re-runs validation, e.g. after command-line overrides.
    pub fn check(&mut self) -> Result<(), ConfigError> {
        self.sync.normalize();
        self.validate()?;
        Ok(())
    }

    fn extract_validated(figment: Figment) -> Result<Self, ConfigError> {
        let mut config: Self = figment.extract()?;
        config.check()?;
        Ok(config)
    }
}
