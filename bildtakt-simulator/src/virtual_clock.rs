//! # Virtual Clock for Simulation
//!
//! Simulated time of the producer, advanced explicitly by each step.
//! Nanosecond resolution; shared handles observe the same time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Clone, Debug, Default)]
pub struct VirtualClock {
    elapsed_ns: Arc<AtomicU64>,
}

impl VirtualClock {
    /// Clock starting at `start_ns` nanoseconds of simulated time.
    pub fn new(start_ns: u64) -> Self {
        Self {
            elapsed_ns: Arc::new(AtomicU64::new(start_ns)),
        }
    }

    #[inline]
    pub fn now_ns(&self) -> u64 {
        self.elapsed_ns.load(Ordering::Acquire)
    }

    /// Current simulated time in seconds.
    #[inline]
    pub fn now_secs(&self) -> f64 {
        self.now_ns() as f64 / 1e9
    }

    #[inline]
    pub fn advance(&self, ns: u64) {
        self.elapsed_ns.fetch_add(ns, Ordering::Release);
    }

    /// Advances by `secs`, rounded to whole nanoseconds.
    pub fn advance_secs(&self, secs: f64) {
        if secs > 0.0 {
            self.advance((secs * 1e9).round() as u64);
        }
    }
}
