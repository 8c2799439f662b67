//! ## bildtakt-simulator::step
//! **How far simulated time moves per producer step**
//!
//! Variable-step integrators do not advance by a constant amount; the
//! jittered model reproduces that deterministically from a seed.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

pub trait StepModel: Send {
    /// Simulated seconds covered by the next step.
    fn next_step(&mut self) -> f64;
}

#[derive(Debug, Clone, Copy)]
pub struct FixedStep {
    secs: f64,
}

impl FixedStep {
    pub fn new(secs: f64) -> Self {
        Self { secs }
    }
}

impl StepModel for FixedStep {
    fn next_step(&mut self) -> f64 {
        self.secs
    }
}

/// Steps uniformly distributed in `nominal * (1 ± jitter)`.
#[derive(Debug)]
pub struct JitteredStep {
    nominal: f64,
    jitter: f64,
    rng: SmallRng,
}

impl JitteredStep {
    pub fn new(nominal: f64, jitter: f64, seed: u64) -> Self {
        Self {
            nominal,
            jitter: jitter.clamp(0.0, 0.99),
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl StepModel for JitteredStep {
    fn next_step(&mut self) -> f64 {
        let factor = 1.0 + self.rng.random_range(-self.jitter..=self.jitter);
        self.nominal * factor
    }
}
