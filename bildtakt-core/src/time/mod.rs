//! ## bildtakt-core::time
//! **Clock mapping between simulated time and wall-clock time**
//!
//! Simulated time is an `f64` in simulation units. The real-time scale says how
//! many simulation units elapse per real second. A [`ClockAnchor`] pins one
//! simulated time to one wall-clock instant; every other expected presentation
//! time is derived from it:
//!
//! `expected_wall = anchor.wall + (sim_time - anchor.sim_time) / scale`
//!
//! Also home to the rate and buffer sizing rules shared by every mode.

use std::time::{Duration, Instant};

/// Frame rate used by Sampling and RealTime when none was requested.
pub const DEFAULT_FRAME_RATE: f64 = 30.0;

/// Playback length the default buffer is sized against.
pub const DEFAULT_BUFFER_SECS: f64 = 0.150;

/// Scale used when a non-positive or non-finite scale is requested.
pub const DEFAULT_REAL_TIME_SCALE: f64 = 1.0;

/// Returns `Some(rate)` only for a usable rate; zero, negative and non-finite
/// requests mean "use the mode default".
pub fn normalize_frame_rate(rate: Option<f64>) -> Option<f64> {
    rate.filter(|r| r.is_finite() && *r > 0.0)
}

pub fn normalize_real_time_scale(scale: f64) -> f64 {
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        DEFAULT_REAL_TIME_SCALE
    }
}

/// Returns `Some(seconds)` for an explicit buffer length (zero included) and
/// `None` for "use the default".
pub fn normalize_buffer_secs(seconds: Option<f64>) -> Option<f64> {
    seconds.filter(|s| s.is_finite() && *s >= 0.0)
}

/// Converts a non-negative number of seconds to a `Duration`, saturating
/// instead of panicking on overflow.
pub fn secs_to_duration(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Wall-clock gap between frames at `fps`.
pub fn frame_interval(fps: f64) -> Duration {
    secs_to_duration(1.0 / fps)
}

/// Whole number of frames whose combined length comes closest to
/// `buffer_secs` at `fps`, never below one frame for a positive request.
pub fn buffer_frames(buffer_secs: f64, fps: f64) -> usize {
    if buffer_secs.is_nan() || fps.is_nan() || buffer_secs <= 0.0 || fps <= 0.0 {
        return 0;
    }
    // Snap float noise first: 0.15 * 30 must round like 4.5, not 4.4999999.
    let exact = (buffer_secs * fps * 1e6).round() / 1e6;
    (exact.round() as usize).max(1)
}

/// Shifts `base` by a signed number of seconds.
pub fn offset_instant(base: Instant, secs: f64) -> Instant {
    if secs >= 0.0 {
        base.checked_add(secs_to_duration(secs)).unwrap_or(base)
    } else {
        base.checked_sub(secs_to_duration(-secs)).unwrap_or(base)
    }
}

/// Signed seconds from `earlier` to `later`.
pub fn signed_secs_between(earlier: Instant, later: Instant) -> f64 {
    if later >= earlier {
        later.duration_since(earlier).as_secs_f64()
    } else {
        -earlier.duration_since(later).as_secs_f64()
    }
}

/// A simulated time pinned to a wall-clock instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockAnchor {
    pub sim_time: f64,
    pub wall: Instant,
}

/// Maps simulated time to wall-clock time under a scale factor.
#[derive(Debug, Clone)]
pub struct ClockMapper {
    scale: f64,
    anchor: Option<ClockAnchor>,
}

impl Default for ClockMapper {
    fn default() -> Self {
        Self::new(DEFAULT_REAL_TIME_SCALE)
    }
}

impl ClockMapper {
    pub fn new(scale: f64) -> Self {
        Self {
            scale: normalize_real_time_scale(scale),
            anchor: None,
        }
    }

    #[inline]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Changes the scale. An existing anchor is moved to the current mapping
    /// point at `now` so the expected time of "now" does not jump.
    pub fn set_scale(&mut self, scale: f64, now: Instant) {
        let scale = normalize_real_time_scale(scale);
        if let Some(sim_now) = self.sim_time_at(now) {
            self.anchor = Some(ClockAnchor {
                sim_time: sim_now,
                wall: now,
            });
        }
        self.scale = scale;
    }

    #[inline]
    pub fn anchor(&self) -> Option<ClockAnchor> {
        self.anchor
    }

    /// Rewrites the anchor so `sim_time` maps to `wall`.
    pub fn rebase(&mut self, sim_time: f64, wall: Instant) {
        self.anchor = Some(ClockAnchor { sim_time, wall });
    }

    pub fn reset(&mut self) {
        self.anchor = None;
    }

    /// Wall-clock instant at which `sim_time` should be presented, if anchored.
    pub fn expected_wall(&self, sim_time: f64) -> Option<Instant> {
        let anchor = self.anchor?;
        Some(offset_instant(
            anchor.wall,
            (sim_time - anchor.sim_time) / self.scale,
        ))
    }

    /// Simulated time that maps to `wall`, if anchored.
    pub fn sim_time_at(&self, wall: Instant) -> Option<f64> {
        let anchor = self.anchor?;
        Some(anchor.sim_time + signed_secs_between(anchor.wall, wall) * self.scale)
    }
}
