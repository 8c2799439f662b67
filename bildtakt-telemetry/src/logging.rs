//! ## bildtakt-telemetry::logging
//! **Structured logging with `tracing`**
//!
//! Installs the process-wide fmt subscriber. `RUST_LOG` wins over the
//! configured fallback level. Thread names are printed so producer and
//! consumer lines can be told apart.

use bildtakt_core::stats::StatsSnapshot;
use tracing::info_span;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Installs the global subscriber. A second call is a no-op.
    pub fn init(fallback_level: &str) {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(fallback_level))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let _ = fmt()
            .with_env_filter(filter)
            .with_thread_names(true)
            .with_span_events(FmtSpan::CLOSE)
            .try_init();
    }

    /// Emits one structured line summarizing a delivery run.
    pub fn log_stats(label: &str, stats: &StatsSnapshot) {
        let span = info_span!("delivery_stats", label = label);
        let _entered = span.enter();
        tracing::info!(
            submitted = stats.submitted,
            rendered = stats.rendered,
            dropped = stats.dropped,
            delayed = stats.delayed,
            resyncs = stats.resyncs,
            min_occupancy = stats.min_occupancy,
            max_occupancy = stats.max_occupancy,
            "Frame delivery summary"
        );
    }
}
