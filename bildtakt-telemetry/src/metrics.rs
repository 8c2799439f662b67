//! ## bildtakt-telemetry::metrics
//! **Prometheus exporter for frame delivery**
//!
//! Counters mirror the engine statistics but are never reset, so scrapes stay
//! monotone across `clear_stats` calls.

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Registry};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
    #[error("Metrics exposition is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub frames_submitted: IntCounter,
    pub frames_rendered: IntCounter,
    pub frames_dropped: IntCounter,
    pub resyncs: IntCounter,
    pub buffer_occupancy: IntGauge,
    pub present_lag: Histogram,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let frames_submitted =
            IntCounter::new("bildtakt_frames_submitted_total", "Frames offered by the producer")?;
        let frames_rendered =
            IntCounter::new("bildtakt_frames_rendered_total", "Frames handed to the renderer")?;
        let frames_dropped = IntCounter::new(
            "bildtakt_frames_dropped_total",
            "Frames discarded by sampling or resynchronization",
        )?;
        let resyncs = IntCounter::new(
            "bildtakt_resyncs_total",
            "Real-time clock resynchronizations after late frames",
        )?;
        let buffer_occupancy =
            IntGauge::new("bildtakt_buffer_occupancy", "Frames waiting in the real-time buffer")?;
        let present_lag = Histogram::with_opts(
            HistogramOpts::new(
                "bildtakt_present_lag_seconds",
                "Delay between scheduled and actual presentation",
            )
            .buckets(vec![0.0005, 0.001, 0.004, 0.016, 0.050, 0.250]),
        )?;

        registry.register(Box::new(frames_submitted.clone()))?;
        registry.register(Box::new(frames_rendered.clone()))?;
        registry.register(Box::new(frames_dropped.clone()))?;
        registry.register(Box::new(resyncs.clone()))?;
        registry.register(Box::new(buffer_occupancy.clone()))?;
        registry.register(Box::new(present_lag.clone()))?;

        Ok(Self {
            registry,
            frames_submitted,
            frames_rendered,
            frames_dropped,
            resyncs,
            buffer_occupancy,
            present_lag,
        })
    }

    pub fn gather_metrics(&self) -> Result<String, MetricsError> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    #[inline]
    pub fn inc_submitted(&self) {
        self.frames_submitted.inc();
    }

    #[inline]
    pub fn inc_dropped(&self, frames: u64) {
        self.frames_dropped.inc_by(frames);
    }

    #[inline]
    pub fn inc_resyncs(&self) {
        self.resyncs.inc();
    }

    /// Records one presentation and how late it was against its schedule.
    pub fn observe_presented(&self, lag_secs: f64, occupancy: usize) {
        self.frames_rendered.inc();
        self.present_lag.observe(lag_secs.max(0.0));
        self.buffer_occupancy.set(occupancy as i64);
    }
}
