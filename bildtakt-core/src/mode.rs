//! Operating modes governing how submitted frames map to presented frames.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The three delivery policies. `PassThrough` is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Present every submitted frame, pacing the producer to the frame rate.
    #[default]
    PassThrough,
    /// Present at most one frame per frame interval and drop the rest.
    Sampling,
    /// Present frames at the wall-clock time matching their simulated time.
    RealTime,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::PassThrough, Mode::Sampling, Mode::RealTime];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::PassThrough => "pass_through",
            Mode::Sampling => "sampling",
            Mode::RealTime => "real_time",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMode(pub String);

impl fmt::Display for UnknownMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown mode '{}'", self.0)
    }
}

impl std::error::Error for UnknownMode {}

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "pass_through" | "passthrough" => Ok(Mode::PassThrough),
            "sampling" => Ok(Mode::Sampling),
            "real_time" | "realtime" => Ok(Mode::RealTime),
            _ => Err(UnknownMode(s.to_string())),
        }
    }
}
