//! Fault injection for the simulated producer: occasional stalls long enough
//! to make real-time delivery fall behind.

use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

#[derive(Debug)]
pub struct StallInjector {
    probability: f64,
    stall: Duration,
    rng: SmallRng,
}

impl StallInjector {
    pub fn new(probability: f64, stall: Duration, seed: u64) -> Self {
        Self {
            probability: probability.clamp(0.0, 1.0),
            stall,
            // Offset so stalls do not correlate with the step sequence.
            rng: SmallRng::seed_from_u64(seed.wrapping_add(0x5354_414c_4c00)),
        }
    }

    pub fn disabled() -> Self {
        Self::new(0.0, Duration::ZERO, 0)
    }

    /// Stall to apply before the next step, if any.
    pub fn next_stall(&mut self) -> Option<Duration> {
        if self.stall.is_zero() || self.probability == 0.0 {
            return None;
        }
        self.rng.random_bool(self.probability).then_some(self.stall)
    }
}
