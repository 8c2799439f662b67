//! # bildtakt Telemetry
//!
//! Crate for logging and metrics around frame delivery.

pub mod logging;
pub mod metrics;

pub use logging::EventLogger;
pub use metrics::{MetricsError, MetricsRecorder};
