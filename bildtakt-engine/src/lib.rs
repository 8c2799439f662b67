//! # bildtakt-engine
//!
//! Delivers frames from a simulation producer to a renderer, paced by one of
//! three modes and, in real-time mode, synchronized to the simulated clock.
//!
//! ### Key Submodules:
//! - `engine`: the producer-facing [`SyncEngine`]
//! - `policy`: per-mode delivery decisions
//! - `delivery`: decoration pipeline and the consumer thread
//! - `observer`: frame controllers, decoration generators and input listeners
//! - `renderer`: the presentation backend trait

mod delivery;
pub mod engine;
pub mod error;
pub mod observer;
mod policy;
pub mod renderer;

pub use engine::{Submission, SyncEngine};
pub use error::SyncError;
pub use observer::{
    DecorationGenerator, EventListener, FrameContext, FrameController, FrameInfo, Modifiers,
    UserInput,
};
pub use renderer::{RenderError, Renderer};
