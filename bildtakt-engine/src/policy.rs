//! Delivery decisions for each mode, kept free of threads and I/O so they can
//! be driven with synthetic instants.

use std::time::{Duration, Instant};

use bildtakt_config::SyncConfig;
use bildtakt_core::mode::Mode;
use bildtakt_core::time::{
    buffer_frames, frame_interval, normalize_buffer_secs, normalize_frame_rate,
    normalize_real_time_scale, offset_instant, signed_secs_between, ClockMapper,
    DEFAULT_BUFFER_SECS, DEFAULT_FRAME_RATE,
};

/// Requested mode and timing knobs, already normalized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Settings {
    pub mode: Mode,
    pub desired_frame_rate: Option<f64>,
    pub desired_buffer_secs: Option<f64>,
    pub real_time_scale: f64,
}

impl Settings {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            mode: config.mode,
            desired_frame_rate: normalize_frame_rate(config.desired_frame_rate),
            desired_buffer_secs: normalize_buffer_secs(config.desired_buffer_secs),
            real_time_scale: normalize_real_time_scale(config.real_time_scale),
        }
    }

    /// Rate the active mode paces to; pass-through without a request is unbounded.
    pub fn pacing_rate(&self) -> Option<f64> {
        match self.mode {
            Mode::PassThrough => self.desired_frame_rate,
            Mode::Sampling | Mode::RealTime => Some(self.real_time_rate()),
        }
    }

    pub fn pacing_interval(&self) -> Option<Duration> {
        self.pacing_rate().map(frame_interval)
    }

    /// Rate the buffer is sized against, whatever the active mode.
    pub fn real_time_rate(&self) -> f64 {
        self.desired_frame_rate.unwrap_or(DEFAULT_FRAME_RATE)
    }

    pub fn buffer_secs(&self) -> f64 {
        self.desired_buffer_secs.unwrap_or(DEFAULT_BUFFER_SECS)
    }

    pub fn buffer_frames(&self) -> usize {
        buffer_frames(self.buffer_secs(), self.real_time_rate())
    }

    /// Playback length the buffer actually holds after rounding to frames.
    pub fn actual_buffer_secs(&self) -> f64 {
        self.buffer_frames() as f64 / self.real_time_rate()
    }
}

/// Pass-through pacing: presentations start at least one interval apart.
#[derive(Debug, Default)]
pub(crate) struct Pacer {
    last_presented: Option<Instant>,
}

impl Pacer {
    /// Instant the next presentation may start, or `None` if it may start now.
    pub fn hold_until(&self, now: Instant, interval: Option<Duration>) -> Option<Instant> {
        let next = self.last_presented? + interval?;
        (next > now).then_some(next)
    }

    pub fn mark(&mut self, presented_at: Instant) {
        self.last_presented = Some(presented_at);
    }
}

/// Sampling: a frame is presented only once the next eligible instant has
/// passed. The next eligible instant is then one interval after acceptance.
#[derive(Debug, Default)]
pub(crate) struct Sampler {
    next_eligible: Option<Instant>,
}

impl Sampler {
    pub fn admit(&mut self, now: Instant, interval: Duration) -> bool {
        match self.next_eligible {
            Some(next) if now < next => false,
            _ => {
                self.next_eligible = Some(now + interval);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.next_eligible = None;
    }
}

/// Outcome of offering a frame to the real-time schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Admission {
    /// The frame falls in a frame slot already covered by an earlier frame.
    Redundant,
    /// The frame's expected presentation is more than one interval behind.
    Late { behind_secs: f64 },
    /// Present at `present_at`. When `hold_until` is set the producer is
    /// running further ahead than the buffer covers and must wait first.
    OnTime {
        present_at: Instant,
        hold_until: Option<Instant>,
    },
}

/// Real-time schedule: maps simulated time onto the wall clock and allows at
/// most one frame per frame slot.
#[derive(Debug)]
pub(crate) struct RealTimeSchedule {
    clock: ClockMapper,
    last_admitted: Option<f64>,
}

impl RealTimeSchedule {
    pub fn new(scale: f64) -> Self {
        Self {
            clock: ClockMapper::new(scale),
            last_admitted: None,
        }
    }

    pub fn clock(&self) -> &ClockMapper {
        &self.clock
    }

    pub fn set_scale(&mut self, scale: f64, now: Instant) {
        self.clock.set_scale(scale, now);
    }

    /// Forgets the anchor; the next frame re-anchors at its arrival time.
    pub fn reset(&mut self) {
        self.clock.reset();
        self.last_admitted = None;
    }

    /// Classifies a frame with simulated time `sim_time` arriving at `now`.
    ///
    /// `rate` is the presentation rate and `horizon` how far ahead of its
    /// presentation a frame may be queued.
    pub fn admit(&mut self, sim_time: f64, now: Instant, rate: f64, horizon: Duration) -> Admission {
        let anchor = match self.clock.anchor() {
            Some(anchor) if sim_time >= anchor.sim_time => anchor,
            // First frame, or simulated time stepped back behind the anchor.
            _ => {
                self.resync(sim_time, now);
                return Admission::OnTime {
                    present_at: now,
                    hold_until: None,
                };
            }
        };
        let scale = self.clock.scale();

        if let Some(last) = self.last_admitted {
            if self.slot_of(sim_time, rate) <= self.slot_of(last, rate) {
                return Admission::Redundant;
            }
        }

        let expected = offset_instant(anchor.wall, (sim_time - anchor.sim_time) / scale);
        let behind_secs = signed_secs_between(expected, now);
        if behind_secs > 1.0 / rate {
            return Admission::Late { behind_secs };
        }

        self.last_admitted = Some(sim_time);
        let hold = offset_instant(expected, -horizon.as_secs_f64());
        Admission::OnTime {
            present_at: expected,
            hold_until: (hold > now).then_some(hold),
        }
    }

    /// Pins `sim_time` to `now` and makes it the last admitted frame.
    pub fn resync(&mut self, sim_time: f64, now: Instant) {
        self.clock.rebase(sim_time, now);
        self.last_admitted = Some(sim_time);
    }

    /// Index of the frame slot holding `sim_time`, counted from the anchor.
    fn slot_of(&self, sim_time: f64, rate: f64) -> i64 {
        let Some(anchor) = self.clock.anchor() else {
            return 0;
        };
        let slot_sim = self.clock.scale() / rate;
        let slots = (sim_time - anchor.sim_time) / slot_sim;
        ((slots * 1e6).round() / 1e6).floor() as i64
    }
}
