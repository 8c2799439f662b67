//! Per-frame collaborators owned by the engine.
//!
//! Decoration generators add geometry to a frame. Frame controllers see the
//! frame just before presentation and may add geometry and steer the camera.
//! Event listeners receive user input. All three are handed over by value at
//! registration and dropped exactly once, when the engine is dropped.

use std::time::Instant;

use bildtakt_core::frame::{CameraCommand, Decoration, Vec3};
use bildtakt_core::mode::Mode;

/// Presentation-side facts about the frame currently being decorated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    pub sim_time: f64,
    pub mode: Mode,
    /// Rate the active mode paces to, `None` when unbounded.
    pub frame_rate: Option<f64>,
    pub real_time_scale: f64,
    /// Wall-clock instant the frame was scheduled for, RealTime only.
    pub scheduled_at: Option<Instant>,
}

/// Handed to each [`FrameController`] during presentation.
pub struct FrameContext<'a> {
    info: FrameInfo,
    camera: &'a mut Vec<CameraCommand>,
}

impl<'a> FrameContext<'a> {
    pub(crate) fn new(info: FrameInfo, camera: &'a mut Vec<CameraCommand>) -> Self {
        Self { info, camera }
    }

    pub fn info(&self) -> &FrameInfo {
        &self.info
    }

    pub fn sim_time(&self) -> f64 {
        self.info.sim_time
    }

    pub fn mode(&self) -> Mode {
        self.info.mode
    }

    pub fn set_camera_transform(&mut self, position: Vec3, forward: Vec3, up: Vec3) {
        self.camera.push(CameraCommand::SetTransform {
            position,
            forward,
            up,
        });
    }

    pub fn point_camera_at(&mut self, point: Vec3, up: Vec3) {
        self.camera.push(CameraCommand::PointAt { point, up });
    }

    pub fn zoom_camera_to_show_all_geometry(&mut self) {
        self.camera.push(CameraCommand::ZoomToShowAllGeometry);
    }

    /// Vertical field of view in radians.
    pub fn set_camera_field_of_view(&mut self, fov: f64) {
        self.camera.push(CameraCommand::FieldOfView(fov));
    }

    pub fn set_camera_clipping_planes(&mut self, near: f64, far: f64) {
        self.camera.push(CameraCommand::ClippingPlanes { near, far });
    }

    /// Camera commands issued so far for this frame.
    pub fn camera_commands(&self) -> &[CameraCommand] {
        self.camera
    }
}

/// Per-frame hook run after every decoration generator.
pub trait FrameController<S>: Send {
    fn generate_controls(
        &mut self,
        ctx: &mut FrameContext<'_>,
        state: &S,
        geometry: &mut Vec<Decoration>,
    );
}

impl<S, F> FrameController<S> for F
where
    F: FnMut(&mut FrameContext<'_>, &S, &mut Vec<Decoration>) + Send,
{
    fn generate_controls(
        &mut self,
        ctx: &mut FrameContext<'_>,
        state: &S,
        geometry: &mut Vec<Decoration>,
    ) {
        self(ctx, state, geometry)
    }
}

/// Adds geometry derived from the frame's state.
pub trait DecorationGenerator<S>: Send {
    fn generate_decorations(&mut self, state: &S, geometry: &mut Vec<Decoration>);
}

impl<S, F> DecorationGenerator<S> for F
where
    F: FnMut(&S, &mut Vec<Decoration>) + Send,
{
    fn generate_decorations(&mut self, state: &S, geometry: &mut Vec<Decoration>) {
        self(state, geometry)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

/// User input forwarded from the presentation side.
#[derive(Debug, Clone, PartialEq)]
pub enum UserInput {
    KeyPressed { key: u32, modifiers: Modifiers },
    MenuSelected { menu: i32, item: i32 },
    SliderMoved { slider: i32, value: f64 },
}

/// Receives user input. Each handler returns `true` when it consumed the
/// event, which stops it from reaching listeners registered later.
pub trait EventListener: Send {
    fn key_pressed(&mut self, _key: u32, _modifiers: Modifiers) -> bool {
        false
    }

    fn menu_selected(&mut self, _menu: i32, _item: i32) -> bool {
        false
    }

    fn slider_moved(&mut self, _slider: i32, _value: f64) -> bool {
        false
    }
}

/// Offers `input` to `listeners` in order; returns whether one consumed it.
pub(crate) fn dispatch(listeners: &mut [Box<dyn EventListener>], input: &UserInput) -> bool {
    listeners.iter_mut().any(|listener| match *input {
        UserInput::KeyPressed { key, modifiers } => listener.key_pressed(key, modifiers),
        UserInput::MenuSelected { menu, item } => listener.menu_selected(menu, item),
        UserInput::SliderMoved { slider, value } => listener.slider_moved(slider, value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use parking_lot::Mutex;

    type Seen = Arc<Mutex<Vec<(&'static str, UserInput)>>>;

    struct Recorder {
        name: &'static str,
        seen: Seen,
        consume: bool,
    }

    impl Recorder {
        fn boxed(name: &'static str, seen: &Seen, consume: bool) -> Box<dyn EventListener> {
            Box::new(Self {
                name,
                seen: Arc::clone(seen),
                consume,
            })
        }

        fn record(&self, input: UserInput) -> bool {
            self.seen.lock().push((self.name, input));
            self.consume
        }
    }

    impl EventListener for Recorder {
        fn key_pressed(&mut self, key: u32, modifiers: Modifiers) -> bool {
            self.record(UserInput::KeyPressed { key, modifiers })
        }

        fn slider_moved(&mut self, slider: i32, value: f64) -> bool {
            self.record(UserInput::SliderMoved { slider, value })
        }
    }

    #[test]
    fn consumed_input_stops_propagation() {
        let seen = Seen::default();
        let mut listeners = vec![
            Recorder::boxed("first", &seen, true),
            Recorder::boxed("second", &seen, false),
        ];
        let key = UserInput::KeyPressed {
            key: 32,
            modifiers: Modifiers::default(),
        };
        assert!(dispatch(&mut listeners, &key));
        assert_eq!(*seen.lock(), vec![("first", key)]);
    }

    #[test]
    fn unhandled_input_reaches_every_listener_in_order() {
        let seen = Seen::default();
        let mut listeners = vec![
            Recorder::boxed("first", &seen, false),
            Recorder::boxed("second", &seen, false),
        ];
        let slider = UserInput::SliderMoved {
            slider: 3,
            value: 0.25,
        };
        assert!(!dispatch(&mut listeners, &slider));
        assert_eq!(
            *seen.lock(),
            vec![("first", slider.clone()), ("second", slider)]
        );

        // Menu picks fall through to the default, non-consuming handler.
        let menu = UserInput::MenuSelected { menu: 1, item: 2 };
        assert!(!dispatch(&mut listeners, &menu));
        assert_eq!(seen.lock().len(), 2);
    }

    #[test]
    fn context_collects_camera_commands() {
        let mut camera = Vec::new();
        let info = FrameInfo {
            sim_time: 1.5,
            mode: Mode::RealTime,
            frame_rate: Some(30.0),
            real_time_scale: 1.0,
            scheduled_at: None,
        };
        let mut ctx = FrameContext::new(info, &mut camera);
        ctx.point_camera_at([0.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        ctx.set_camera_field_of_view(0.8);
        assert_eq!(ctx.camera_commands().len(), 2);
        assert_eq!(ctx.sim_time(), 1.5);
        assert_eq!(camera[1], CameraCommand::FieldOfView(0.8));
    }
}
