//! Delivery mode and timing parameters for the synchronization engine.
//!
//! Unset optional values mean "use the engine default", which keeps an
//! explicit zero-length buffer distinguishable from "default buffer".
//! Out-of-domain requests are normalized to those defaults, not rejected.

use bildtakt_core::mode::Mode;
use bildtakt_core::time::{normalize_buffer_secs, normalize_frame_rate, normalize_real_time_scale};
use serde::{Deserialize, Serialize};
use validator::{self, Validate};

/// Engine timing configuration.
#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct SyncConfig {
    /// Active delivery policy.
    #[serde(default)]
    pub mode: Mode,

    /// Target presentation rate in frames per real second. Unset means
    /// unbounded for pass-through and 30 fps otherwise; zero or negative
    /// means unset.
    #[serde(default)]
    pub desired_frame_rate: Option<f64>,

    /// Simulation time units per real second; zero or negative means 1.0.
    #[serde(default = "default_real_time_scale")]
    #[validate(range(max = 1.0e6))]
    pub real_time_scale: f64,

    /// Requested real-time buffer length. Unset means the whole number of
    /// frames closest to 150 ms, as does a negative length; zero disables
    /// buffering.
    #[serde(default)]
    #[validate(range(max = 10.0))]
    pub desired_buffer_secs: Option<f64>,
}

fn default_real_time_scale() -> f64 {
    bildtakt_core::time::DEFAULT_REAL_TIME_SCALE
}

impl SyncConfig {
    /// Rewrites sentinel and non-finite values to the settings they stand for.
    pub fn normalize(&mut self) {
        self.desired_frame_rate = normalize_frame_rate(self.desired_frame_rate);
        self.real_time_scale = normalize_real_time_scale(self.real_time_scale);
        self.desired_buffer_secs = normalize_buffer_secs(self.desired_buffer_secs);
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            desired_frame_rate: None,
            real_time_scale: default_real_time_scale(),
            desired_buffer_secs: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_unset() {
        let config = SyncConfig::default();
        assert_eq!(config.mode, Mode::PassThrough);
        assert!(config.desired_frame_rate.is_none());
        assert!(config.desired_buffer_secs.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn sentinels_normalize_to_defaults() {
        let mut config = SyncConfig {
            mode: Mode::RealTime,
            desired_frame_rate: Some(0.0),
            real_time_scale: -3.0,
            desired_buffer_secs: Some(-1.0),
        };
        config.normalize();

        assert_eq!(config.desired_frame_rate, None);
        assert_eq!(config.real_time_scale, 1.0);
        assert_eq!(config.desired_buffer_secs, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn normalize_keeps_zero_buffer_and_high_rates() {
        let mut config = SyncConfig {
            desired_frame_rate: Some(5000.0),
            real_time_scale: f64::NAN,
            desired_buffer_secs: Some(0.0),
            ..SyncConfig::default()
        };
        config.normalize();

        assert_eq!(config.desired_frame_rate, Some(5000.0));
        assert_eq!(config.real_time_scale, 1.0);
        assert_eq!(config.desired_buffer_secs, Some(0.0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn oversized_buffer_is_rejected() {
        let config = SyncConfig {
            desired_buffer_secs: Some(60.0),
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
