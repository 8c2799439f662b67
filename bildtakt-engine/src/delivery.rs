//! The presentation side: decorating frames, handing them to the renderer and
//! the consumer thread that drains the real-time buffer.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use bildtakt_core::buffer::FrameBuffer;
use bildtakt_core::frame::{DecoratedFrame, Frame, Timestamped};
use bildtakt_core::stats::DeliveryStats;
use bildtakt_core::time::signed_secs_between;
use bildtakt_telemetry::MetricsRecorder;
use parking_lot::Mutex;
use tracing::{debug, error, info, trace};

use crate::error::SyncError;
use crate::observer::{DecorationGenerator, FrameContext, FrameController, FrameInfo};
use crate::renderer::{RenderError, Renderer};

pub(crate) const CONSUMER_THREAD_NAME: &str = "bildtakt-consumer";

/// A frame waiting in the real-time buffer.
pub(crate) struct Scheduled<S> {
    pub frame: Frame<S>,
    pub info: FrameInfo,
}

impl<S> Timestamped for Scheduled<S> {
    fn sim_time(&self) -> f64 {
        self.frame.sim_time()
    }
}

/// Renderer plus the collaborators that decorate each frame.
pub(crate) struct Pipeline<S> {
    renderer: Box<dyn Renderer<S>>,
    generators: Vec<Box<dyn DecorationGenerator<S>>>,
    controllers: Vec<Box<dyn FrameController<S>>>,
    metrics: Option<Arc<MetricsRecorder>>,
}

impl<S> Pipeline<S> {
    pub fn new(renderer: Box<dyn Renderer<S>>) -> Self {
        Self {
            renderer,
            generators: Vec::new(),
            controllers: Vec::new(),
            metrics: None,
        }
    }

    pub fn add_generator(&mut self, generator: Box<dyn DecorationGenerator<S>>) {
        self.generators.push(generator);
    }

    pub fn add_controller(&mut self, controller: Box<dyn FrameController<S>>) {
        self.controllers.push(controller);
    }

    pub fn controller_count(&self) -> usize {
        self.controllers.len()
    }

    pub fn set_metrics(&mut self, metrics: Arc<MetricsRecorder>) {
        self.metrics = Some(metrics);
    }

    /// Generators run first, then controllers in registration order.
    fn decorate(&mut self, frame: Frame<S>, info: FrameInfo) -> DecoratedFrame<S> {
        let mut decorated = DecoratedFrame::new(frame);
        {
            let DecoratedFrame {
                frame,
                decorations,
                camera,
            } = &mut decorated;
            for generator in &mut self.generators {
                generator.generate_decorations(frame.state(), decorations);
            }
            let mut ctx = FrameContext::new(info, camera);
            for controller in &mut self.controllers {
                controller.generate_controls(&mut ctx, frame.state(), decorations);
            }
        }
        decorated
    }
}

/// State shared between the engine and its consumer thread.
pub(crate) struct Shared<S> {
    pub buffer: FrameBuffer<Scheduled<S>>,
    pub stats: DeliveryStats,
    pipeline: Mutex<Pipeline<S>>,
    /// First renderer failure seen on the consumer thread.
    fault: Mutex<Option<RenderError>>,
}

impl<S> Shared<S> {
    pub fn new(buffer: FrameBuffer<Scheduled<S>>, pipeline: Pipeline<S>) -> Self {
        Self {
            buffer,
            stats: DeliveryStats::new(),
            pipeline: Mutex::new(pipeline),
            fault: Mutex::new(None),
        }
    }

    pub fn pipeline(&self) -> parking_lot::MutexGuard<'_, Pipeline<S>> {
        self.pipeline.lock()
    }

    /// Decorates and presents one frame, then records it.
    pub fn present(&self, frame: Frame<S>, info: FrameInfo) -> Result<(), SyncError> {
        let mut pipeline = self.pipeline.lock();
        let decorated = pipeline.decorate(frame, info);
        pipeline.renderer.present(decorated).map_err(SyncError::Render)?;

        let occupancy = self.buffer.len();
        self.stats.record_rendered();
        self.stats.observe_occupancy(occupancy);
        if let Some(metrics) = &pipeline.metrics {
            let lag = info
                .scheduled_at
                .map(|at| signed_secs_between(at, Instant::now()).max(0.0))
                .unwrap_or(0.0);
            metrics.observe_presented(lag, occupancy);
        }
        trace!(sim_time = info.sim_time, occupancy, "Frame presented");
        Ok(())
    }

    pub fn take_fault(&self) -> Option<RenderError> {
        self.fault.lock().take()
    }

    fn record_fault(&self, err: RenderError) {
        let mut fault = self.fault.lock();
        if fault.is_none() {
            *fault = Some(err);
        }
    }
}

/// Closes the buffer if the consumer unwinds, so the producer never waits on
/// a thread that is gone.
struct CloseOnExit<'a, S>(&'a FrameBuffer<Scheduled<S>>);

impl<S> Drop for CloseOnExit<'_, S> {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("Frame consumer panicked; closing the buffer");
            self.0.close();
        }
    }
}

pub(crate) fn spawn_consumer<S: Send + 'static>(
    shared: Arc<Shared<S>>,
) -> Result<JoinHandle<()>, SyncError> {
    thread::Builder::new()
        .name(CONSUMER_THREAD_NAME.to_string())
        .spawn(move || consume(&shared))
        .map_err(SyncError::Spawn)
}

/// Drains the buffer in order, presenting each frame at its scheduled time.
fn consume<S>(shared: &Shared<S>) {
    let _guard = CloseOnExit(&shared.buffer);
    info!("Frame consumer started");
    while let Some(scheduled) = shared.buffer.drain_next() {
        if let Some(present_at) = scheduled.info.scheduled_at {
            if !shared.buffer.sleep_until(present_at) {
                break;
            }
        }
        match shared.present(scheduled.frame, scheduled.info) {
            Ok(()) => {}
            Err(SyncError::Render(err)) => {
                error!(error = %err, "Renderer failed on the consumer thread");
                shared.record_fault(err);
            }
            Err(other) => debug!(error = %other, "Presentation skipped"),
        }
        shared.buffer.complete();
    }
    info!("Frame consumer stopped");
}
