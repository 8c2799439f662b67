//! Simulated producer parameters.
//!
//! Drives the deterministic producer in `bildtakt-simulator`: how many frames
//! it emits, how far simulated time advances per step, how much wall time a
//! step costs and how often it stalls.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct ProducerConfig {
    /// Seed for step jitter and stall injection.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Number of frames to submit.
    #[serde(default = "default_frame_count")]
    #[validate(range(min = 1, max = 10_000_000))]
    pub frame_count: usize,

    /// Nominal simulated time advanced per step.
    #[serde(default = "default_step_secs")]
    #[validate(range(exclusive_min = 0.0, max = 10.0))]
    pub step_secs: f64,

    /// Fraction of `step_secs` by which a step may randomly deviate.
    #[serde(default)]
    #[validate(range(min = 0.0, max = 0.99))]
    pub step_jitter: f64,

    /// Wall time spent computing one step, in milliseconds.
    #[serde(default)]
    #[validate(range(max = 1000))]
    pub work_ms: u64,

    /// Probability that a step stalls the producer.
    #[serde(default)]
    #[validate(range(min = 0.0, max = 1.0))]
    pub stall_probability: f64,

    /// Length of an injected stall, in milliseconds.
    #[serde(default = "default_stall_ms")]
    #[validate(range(max = 60_000))]
    pub stall_ms: u64,
}

fn default_seed() -> u64 {
    42
}

fn default_frame_count() -> usize {
    600
}

fn default_step_secs() -> f64 {
    1.0 / 60.0
}

fn default_stall_ms() -> u64 {
    250
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            frame_count: default_frame_count(),
            step_secs: default_step_secs(),
            step_jitter: 0.0,
            work_ms: 0,
            stall_probability: 0.0,
            stall_ms: default_stall_ms(),
        }
    }
}
