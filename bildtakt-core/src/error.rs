use std::collections::TryReserveError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BufferError {
    #[error("Frame buffer storage could not be allocated: {0}")]
    Allocation(#[from] TryReserveError),

    #[error("Frame buffer is closed")]
    Closed,
}
