//! The simulated system: a damped pendulum, plus the decoration generator and
//! frame controller that visualize it.

use std::f64::consts::TAU;

use bildtakt_core::frame::{Decoration, Vec3};
use bildtakt_engine::{DecorationGenerator, FrameContext, FrameController};

const PIVOT: Vec3 = [0.0, 1.0, 0.0];
const ROD_LENGTH: f64 = 1.0;
const AMPLITUDE: f64 = 0.6;
const PERIOD_SECS: f64 = 2.0;
const DAMPING: f64 = 0.05;

/// Producer state captured in each frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PendulumState {
    pub step: u64,
    /// Angle from vertical in radians.
    pub angle: f64,
    pub bob: Vec3,
}

impl PendulumState {
    /// Closed-form state at simulated time `t`.
    pub fn at(step: u64, t: f64) -> Self {
        let angle = AMPLITUDE * (-DAMPING * t).exp() * (TAU * t / PERIOD_SECS).cos();
        let bob = [
            PIVOT[0] + ROD_LENGTH * angle.sin(),
            PIVOT[1] - ROD_LENGTH * angle.cos(),
            PIVOT[2],
        ];
        Self { step, angle, bob }
    }
}

/// Draws the rod and the bob.
#[derive(Debug, Default)]
pub struct PendulumRod;

impl DecorationGenerator<PendulumState> for PendulumRod {
    fn generate_decorations(&mut self, state: &PendulumState, geometry: &mut Vec<Decoration>) {
        geometry.push(Decoration::Line {
            from: PIVOT,
            to: state.bob,
        });
        geometry.push(Decoration::Point { at: state.bob });
    }
}

/// Keeps the camera on the bob and labels the frame with its simulated time.
#[derive(Debug, Default)]
pub struct FollowBob;

impl FrameController<PendulumState> for FollowBob {
    fn generate_controls(
        &mut self,
        ctx: &mut FrameContext<'_>,
        state: &PendulumState,
        geometry: &mut Vec<Decoration>,
    ) {
        ctx.point_camera_at(state.bob, [0.0, 1.0, 0.0]);
        geometry.push(Decoration::Text {
            at: PIVOT,
            text: format!("t = {:.3} ({})", ctx.sim_time(), ctx.mode()),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_full_amplitude() {
        let state = PendulumState::at(0, 0.0);
        assert!((state.angle - AMPLITUDE).abs() < 1e-12);
    }

    #[test]
    fn bob_stays_on_the_rod() {
        for i in 0..200 {
            let state = PendulumState::at(i, f64::from(i as u32) * 0.037);
            let dx = state.bob[0] - PIVOT[0];
            let dy = state.bob[1] - PIVOT[1];
            assert!(((dx * dx + dy * dy).sqrt() - ROD_LENGTH).abs() < 1e-9);
        }
    }

    #[test]
    fn rod_generator_adds_line_and_point() {
        let mut geometry = Vec::new();
        PendulumRod.generate_decorations(&PendulumState::at(0, 0.5), &mut geometry);
        assert_eq!(geometry.len(), 2);
        assert!(matches!(geometry[0], Decoration::Line { .. }));
    }
}
