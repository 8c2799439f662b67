//! ## bildtakt-core::frame
//! **Timestamped state snapshots and decorated frames**
//!
//! A [`Frame`] is what the producer offers; a [`DecoratedFrame`] is what the
//! renderer receives after decoration generators and frame controllers ran.

/// Point or direction in scene space.
pub type Vec3 = [f64; 3];

/// Anything that can be ordered on the simulated time axis.
pub trait Timestamped {
    fn sim_time(&self) -> f64;
}

/// One timestamped state snapshot offered for rendering.
///
/// Identity is the simulated time. Frames from one producer are totally
/// ordered by it and presented in that order.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame<S> {
    sim_time: f64,
    state: S,
}

impl<S> Frame<S> {
    pub fn new(sim_time: f64, state: S) -> Self {
        Self { sim_time, state }
    }

    #[inline]
    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    #[inline]
    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn into_state(self) -> S {
        self.state
    }
}

impl<S> Timestamped for Frame<S> {
    #[inline]
    fn sim_time(&self) -> f64 {
        self.sim_time
    }
}

/// Per-frame geometry appended by decoration generators and frame controllers.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoration {
    Point { at: Vec3 },
    Line { from: Vec3, to: Vec3 },
    Text { at: Vec3, text: String },
}

/// Camera adjustments requested while a frame is being prepared.
#[derive(Debug, Clone, PartialEq)]
pub enum CameraCommand {
    /// Place the camera at `position`, looking along `forward` with `up` upward.
    SetTransform { position: Vec3, forward: Vec3, up: Vec3 },
    /// Rotate the camera to look at `point`.
    PointAt { point: Vec3, up: Vec3 },
    /// Dolly so all geometry in the scene is visible.
    ZoomToShowAllGeometry,
    /// Vertical field of view in radians.
    FieldOfView(f64),
    ClippingPlanes { near: f64, far: f64 },
}

/// A finished frame, ready for presentation. Ownership moves to the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct DecoratedFrame<S> {
    pub frame: Frame<S>,
    pub decorations: Vec<Decoration>,
    pub camera: Vec<CameraCommand>,
}

impl<S> DecoratedFrame<S> {
    pub fn new(frame: Frame<S>) -> Self {
        Self {
            frame,
            decorations: Vec::new(),
            camera: Vec::new(),
        }
    }

    #[inline]
    pub fn sim_time(&self) -> f64 {
        self.frame.sim_time()
    }
}

impl<S> Timestamped for DecoratedFrame<S> {
    fn sim_time(&self) -> f64 {
        self.frame.sim_time()
    }
}
