//! A renderer that records what it was asked to present.
//!
//! The BLAKE3 digest over presented simulated times identifies a delivery
//! sequence; identical seeds in pass-through mode reproduce it exactly.

use std::sync::Arc;
use std::time::Instant;

use bildtakt_core::frame::DecoratedFrame;
use bildtakt_engine::{RenderError, Renderer};
use blake3::Hasher;
use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub struct PresentedFrame {
    pub sim_time: f64,
    pub presented_at: Instant,
    pub decorations: usize,
    pub camera_commands: usize,
}

#[derive(Debug)]
struct PresentationLog {
    frames: Vec<PresentedFrame>,
    hasher: Hasher,
}

/// Read side of a [`RecordingRenderer`], usable after the engine took
/// ownership of the renderer.
#[derive(Debug, Clone)]
pub struct Presentations {
    log: Arc<Mutex<PresentationLog>>,
}

impl Presentations {
    pub fn len(&self) -> usize {
        self.log.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn frames(&self) -> Vec<PresentedFrame> {
        self.log.lock().frames.clone()
    }

    pub fn sim_times(&self) -> Vec<f64> {
        self.log.lock().frames.iter().map(|f| f.sim_time).collect()
    }

    /// Hex digest of the presented sequence so far.
    pub fn digest(&self) -> String {
        hex::encode(self.log.lock().hasher.finalize().as_bytes())
    }
}

pub struct RecordingRenderer {
    log: Arc<Mutex<PresentationLog>>,
}

impl RecordingRenderer {
    pub fn new() -> (Self, Presentations) {
        let log = Arc::new(Mutex::new(PresentationLog {
            frames: Vec::new(),
            hasher: Hasher::new(),
        }));
        let handle = Presentations {
            log: Arc::clone(&log),
        };
        (Self { log }, handle)
    }
}

impl<S> Renderer<S> for RecordingRenderer {
    fn present(&mut self, frame: DecoratedFrame<S>) -> Result<(), RenderError> {
        let mut log = self.log.lock();
        log.hasher.update(&frame.sim_time().to_bits().to_le_bytes());
        log.hasher.update(&(frame.decorations.len() as u64).to_le_bytes());
        log.frames.push(PresentedFrame {
            sim_time: frame.sim_time(),
            presented_at: Instant::now(),
            decorations: frame.decorations.len(),
            camera_commands: frame.camera.len(),
        });
        Ok(())
    }
}
