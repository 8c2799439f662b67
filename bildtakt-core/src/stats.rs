//! ## bildtakt-core::stats
//! **Delivery counters and buffer occupancy watermarks**
//!
//! Counters only grow until [`DeliveryStats::clear`]. They are atomics so the
//! producer and the consumer thread can both record without a lock.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

/// Marker for "no occupancy sample since the last clear".
const NO_SAMPLE: usize = usize::MAX;

/// Thread-safe delivery statistics.
pub struct DeliveryStats {
    submitted: AtomicU64,
    rendered: AtomicU64,
    dropped: AtomicU64,
    delayed: AtomicU64,
    resyncs: AtomicU64,
    min_occupancy: AtomicUsize,
    max_occupancy: AtomicUsize,
}

impl DeliveryStats {
    pub fn new() -> Self {
        DeliveryStats {
            submitted: AtomicU64::new(0),
            rendered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            delayed: AtomicU64::new(0),
            resyncs: AtomicU64::new(0),
            min_occupancy: AtomicUsize::new(NO_SAMPLE),
            max_occupancy: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_rendered(&self) {
        self.rendered.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dropped(&self, frames: u64) {
        self.dropped.fetch_add(frames, Ordering::Relaxed);
    }

    /// A submission that had to block the producer.
    #[inline]
    pub fn record_delayed(&self) {
        self.delayed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_resync(&self) {
        self.resyncs.fetch_add(1, Ordering::Relaxed);
    }

    /// Folds one buffer occupancy sample into the watermarks.
    #[inline]
    pub fn observe_occupancy(&self, occupancy: usize) {
        self.min_occupancy.fetch_min(occupancy, Ordering::Relaxed);
        self.max_occupancy.fetch_max(occupancy, Ordering::Relaxed);
    }

    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    pub fn rendered(&self) -> u64 {
        self.rendered.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn delayed(&self) -> u64 {
        self.delayed.load(Ordering::Relaxed)
    }

    pub fn resyncs(&self) -> u64 {
        self.resyncs.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let min = self.min_occupancy.load(Ordering::Relaxed);
        StatsSnapshot {
            submitted: self.submitted(),
            rendered: self.rendered(),
            dropped: self.dropped(),
            delayed: self.delayed(),
            resyncs: self.resyncs(),
            min_occupancy: if min == NO_SAMPLE { 0 } else { min },
            max_occupancy: self.max_occupancy.load(Ordering::Relaxed),
        }
    }

    /// Writes a human-readable snapshot to `sink`. Does not mutate anything.
    pub fn dump<W: io::Write + ?Sized>(&self, sink: &mut W) -> io::Result<()> {
        write!(sink, "{}", self.snapshot())
    }

    /// Resets all counters and watermarks to zero.
    pub fn clear(&self) {
        self.submitted.store(0, Ordering::Relaxed);
        self.rendered.store(0, Ordering::Relaxed);
        self.dropped.store(0, Ordering::Relaxed);
        self.delayed.store(0, Ordering::Relaxed);
        self.resyncs.store(0, Ordering::Relaxed);
        self.min_occupancy.store(NO_SAMPLE, Ordering::Relaxed);
        self.max_occupancy.store(0, Ordering::Relaxed);
    }
}

impl Default for DeliveryStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`DeliveryStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatsSnapshot {
    pub submitted: u64,
    pub rendered: u64,
    pub dropped: u64,
    pub delayed: u64,
    pub resyncs: u64,
    pub min_occupancy: usize,
    pub max_occupancy: usize,
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Frame delivery statistics:")?;
        writeln!(f, "  submitted:      {}", self.submitted)?;
        writeln!(f, "  rendered:       {}", self.rendered)?;
        writeln!(f, "  dropped:        {}", self.dropped)?;
        writeln!(f, "  delayed:        {}", self.delayed)?;
        writeln!(f, "  resyncs:        {}", self.resyncs)?;
        writeln!(
            f,
            "  buffer occupancy: min {} / max {}",
            self.min_occupancy, self.max_occupancy
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment_and_read() {
        let stats = DeliveryStats::new();
        stats.record_submitted();
        stats.record_submitted();
        stats.record_rendered();
        stats.record_dropped(3);
        stats.record_delayed();
        stats.record_resync();

        let snap = stats.snapshot();
        assert_eq!(snap.submitted, 2);
        assert_eq!(snap.rendered, 1);
        assert_eq!(snap.dropped, 3);
        assert_eq!(snap.delayed, 1);
        assert_eq!(snap.resyncs, 1);
    }

    #[test]
    fn watermarks_track_extremes() {
        let stats = DeliveryStats::new();
        assert_eq!(stats.snapshot().min_occupancy, 0);

        for occupancy in [4, 2, 7, 3] {
            stats.observe_occupancy(occupancy);
        }
        let snap = stats.snapshot();
        assert_eq!(snap.min_occupancy, 2);
        assert_eq!(snap.max_occupancy, 7);
    }

    #[test]
    fn clear_is_idempotent() {
        let stats = DeliveryStats::new();
        stats.record_submitted();
        stats.observe_occupancy(5);

        stats.clear();
        let once = stats.snapshot();
        stats.clear();
        assert_eq!(stats.snapshot(), once);
        assert_eq!(once, StatsSnapshot::default());
    }

    #[test]
    fn dump_does_not_mutate() {
        let stats = DeliveryStats::new();
        stats.record_submitted();
        stats.observe_occupancy(1);
        let before = stats.snapshot();

        let mut out = Vec::new();
        stats.dump(&mut out).unwrap();
        stats.dump(&mut out).unwrap();

        assert_eq!(stats.snapshot(), before);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("submitted:      1"));
    }
}
