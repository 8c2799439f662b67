use bildtakt_core::BufferError;
use thiserror::Error;

use crate::renderer::RenderError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Frame buffer error: {0}")]
    Buffer(BufferError),

    #[error("Renderer failed: {0}")]
    Render(#[source] RenderError),

    #[error("Frame consumer thread could not be started: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Engine is shutting down")]
    Shutdown,
}

impl From<BufferError> for SyncError {
    fn from(err: BufferError) -> Self {
        match err {
            BufferError::Closed => SyncError::Shutdown,
            other => SyncError::Buffer(other),
        }
    }
}
