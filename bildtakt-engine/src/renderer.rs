//! The presentation backend seen from the engine.

use bildtakt_core::frame::DecoratedFrame;

/// Failure reported by a renderer. Surfaced to the caller, never retried.
pub type RenderError = Box<dyn std::error::Error + Send + Sync>;

/// Accepts a finished frame and presents it.
///
/// Called with one frame at a time, in presentation order, either on the
/// producer thread or on the consumer thread. May be slow; the engine waits.
pub trait Renderer<S>: Send {
    fn present(&mut self, frame: DecoratedFrame<S>) -> Result<(), RenderError>;
}

impl<S, R: Renderer<S> + ?Sized> Renderer<S> for Box<R> {
    fn present(&mut self, frame: DecoratedFrame<S>) -> Result<(), RenderError> {
        (**self).present(frame)
    }
}
