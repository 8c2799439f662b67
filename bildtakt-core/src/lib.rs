//! # bildtakt-core
//!
//! Foundation layer for frame synchronization between a simulation producer
//! and a rendering consumer.
//!
//! ### Key Submodules:
//! - `frame`: timestamped state snapshots and the decorated frames handed to a renderer
//! - `buffer`: bounded FIFO with blocking enqueue/dequeue shared with the consumer thread
//! - `time`: clock mapping between simulated and wall-clock time, rate and buffer sizing rules
//! - `stats`: lock-free delivery counters and occupancy watermarks

pub mod buffer;
pub mod error;
pub mod frame;
pub mod mode;
pub mod stats;
pub mod time;

pub mod prelude {
    pub use crate::buffer::*;
    pub use crate::error::*;
    pub use crate::frame::*;
    pub use crate::mode::*;
    pub use crate::stats::*;
    pub use crate::time::*;
}

pub use error::BufferError;
