//! ## bildtakt-engine::engine
//! **Producer-facing synchronization engine**
//!
//! The producer offers frames through [`SyncEngine::submit`]; the active
//! [`Mode`] decides whether each frame is presented at once, dropped, or
//! scheduled against the simulated clock:
//!
//! - **PassThrough**: every frame, in order, at most the desired rate
//! - **Sampling**: frames arriving before the next eligible instant are dropped
//! - **RealTime**: frames are queued in a bounded buffer and presented by a
//!   consumer thread when the wall clock reaches their simulated time
//!
//! Frames are presented in submission order across mode changes: before a
//! frame is presented on the producer thread, frames still queued for the
//! consumer are drained.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use bildtakt_config::SyncConfig;
use bildtakt_core::buffer::FrameBuffer;
use bildtakt_core::frame::Frame;
use bildtakt_core::mode::Mode;
use bildtakt_core::stats::StatsSnapshot;
use bildtakt_core::time::{
    frame_interval, normalize_buffer_secs, normalize_frame_rate, normalize_real_time_scale,
    secs_to_duration,
};
use bildtakt_telemetry::MetricsRecorder;
use crossbeam::channel::{self, Receiver, Sender};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::delivery::{spawn_consumer, Pipeline, Scheduled, Shared};
use crate::error::SyncError;
use crate::observer::{
    dispatch, DecorationGenerator, EventListener, FrameController, FrameInfo, UserInput,
};
use crate::policy::{Admission, Pacer, RealTimeSchedule, Sampler, Settings};
use crate::renderer::Renderer;

/// What happened to a submitted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Presented before `submit` returned.
    Presented,
    /// Queued for the consumer thread.
    Queued,
    /// Discarded by sampling or because its frame slot was already filled.
    Dropped,
    /// Arrived late; the clock was re-anchored on it and it was handed on.
    Resynced,
}

/// Delivers simulation frames to a [`Renderer`] according to the active mode.
///
/// Owns the renderer and every registered collaborator. Dropping the engine
/// stops the consumer thread; frames still queued at that point are
/// discarded, so call [`flush`](Self::flush) first to see them presented.
pub struct SyncEngine<S: Send + 'static> {
    shared: Arc<Shared<S>>,
    settings: Settings,
    pacer: Pacer,
    sampler: Sampler,
    schedule: RealTimeSchedule,
    consumer: Option<JoinHandle<()>>,
    listeners: Vec<Box<dyn EventListener>>,
    input_tx: Sender<UserInput>,
    input_rx: Receiver<UserInput>,
    metrics: Option<Arc<MetricsRecorder>>,
}

impl<S: Send + 'static> SyncEngine<S> {
    /// Engine in pass-through mode with default timing.
    pub fn new<R: Renderer<S> + 'static>(renderer: R) -> Result<Self, SyncError> {
        Self::with_config(renderer, &SyncConfig::default())
    }

    pub fn with_config<R: Renderer<S> + 'static>(
        renderer: R,
        config: &SyncConfig,
    ) -> Result<Self, SyncError> {
        let settings = Settings::from_config(config);
        let buffer = FrameBuffer::with_capacity(settings.buffer_frames())?;
        let (input_tx, input_rx) = channel::unbounded();

        info!(
            mode = %settings.mode,
            frame_rate = ?settings.desired_frame_rate,
            real_time_scale = settings.real_time_scale,
            buffer_frames = settings.buffer_frames(),
            "Initializing frame synchronization engine"
        );

        Ok(Self {
            shared: Arc::new(Shared::new(buffer, Pipeline::new(Box::new(renderer)))),
            settings,
            pacer: Pacer::default(),
            sampler: Sampler::default(),
            schedule: RealTimeSchedule::new(settings.real_time_scale),
            consumer: None,
            listeners: Vec::new(),
            input_tx,
            input_rx,
            metrics: None,
        })
    }

    /// Offers the next frame. Frames must arrive in nondecreasing simulated
    /// time.
    ///
    /// Pending user input is dispatched first. A renderer failure on the
    /// consumer thread is reported by the next call to `submit` or `flush`;
    /// the frame passed to that call is not processed.
    #[instrument(level = "trace", skip_all, fields(sim_time = frame.sim_time()))]
    pub fn submit(&mut self, frame: Frame<S>) -> Result<Submission, SyncError> {
        self.surface_fault()?;
        self.dispatch_input();
        self.shared.stats.record_submitted();
        if let Some(metrics) = &self.metrics {
            metrics.inc_submitted();
        }

        match self.settings.mode {
            Mode::PassThrough => self.submit_pass_through(frame),
            Mode::Sampling => self.submit_sampling(frame),
            Mode::RealTime => self.submit_real_time(frame),
        }
    }

    fn submit_pass_through(&mut self, frame: Frame<S>) -> Result<Submission, SyncError> {
        self.wait_for_consumer()?;
        let now = Instant::now();
        if let Some(until) = self.pacer.hold_until(now, self.settings.pacing_interval()) {
            self.shared.stats.record_delayed();
            thread::sleep(until.saturating_duration_since(now));
        }
        self.pacer.mark(Instant::now());
        self.present_now(frame, None)?;
        Ok(Submission::Presented)
    }

    fn submit_sampling(&mut self, frame: Frame<S>) -> Result<Submission, SyncError> {
        let interval = frame_interval(self.settings.real_time_rate());
        if !self.sampler.admit(Instant::now(), interval) {
            self.record_dropped(1);
            return Ok(Submission::Dropped);
        }
        self.wait_for_consumer()?;
        self.present_now(frame, None)?;
        Ok(Submission::Presented)
    }

    fn submit_real_time(&mut self, frame: Frame<S>) -> Result<Submission, SyncError> {
        if !frame.sim_time().is_finite() {
            warn!(sim_time = frame.sim_time(), "Frame has no usable simulated time; dropping");
            self.record_dropped(1);
            return Ok(Submission::Dropped);
        }
        let rate = self.settings.real_time_rate();
        let horizon = secs_to_duration(self.settings.actual_buffer_secs());
        let sim_time = frame.sim_time();
        let now = Instant::now();

        match self.schedule.admit(sim_time, now, rate, horizon) {
            Admission::Redundant => {
                trace!(sim_time, "Frame slot already filled; dropping frame");
                self.record_dropped(1);
                Ok(Submission::Dropped)
            }
            Admission::Late { behind_secs } => {
                let discarded = self.shared.buffer.resync_discard(sim_time);
                self.record_dropped(discarded as u64);
                self.shared.stats.record_resync();
                if let Some(metrics) = &self.metrics {
                    metrics.inc_resyncs();
                }
                warn!(
                    sim_time,
                    behind_ms = behind_secs * 1e3,
                    discarded,
                    "Frame arrived late; resynchronizing clock"
                );
                self.schedule.resync(sim_time, now);
                self.deliver_real_time(frame, now, false)?;
                Ok(Submission::Resynced)
            }
            Admission::OnTime {
                present_at,
                hold_until,
            } => {
                let held = match hold_until {
                    Some(until) => {
                        self.shared.stats.record_delayed();
                        thread::sleep(until.saturating_duration_since(Instant::now()));
                        true
                    }
                    None => false,
                };
                self.deliver_real_time(frame, present_at, held)
            }
        }
    }

    /// Queues the frame for the consumer, or presents it here when buffering
    /// is disabled. `delayed` tells whether this submission was already
    /// counted as delayed.
    fn deliver_real_time(
        &mut self,
        frame: Frame<S>,
        present_at: Instant,
        delayed: bool,
    ) -> Result<Submission, SyncError> {
        if self.settings.buffer_frames() == 0 {
            self.wait_for_consumer()?;
            let now = Instant::now();
            if present_at > now {
                if !delayed {
                    self.shared.stats.record_delayed();
                }
                thread::sleep(present_at - now);
            }
            self.present_now(frame, Some(present_at))?;
            return Ok(Submission::Presented);
        }

        self.ensure_consumer()?;
        let info = self.frame_info(frame.sim_time(), Some(present_at));
        let enqueued = self.shared.buffer.enqueue(Scheduled { frame, info })?;
        if enqueued.waited && !delayed {
            self.shared.stats.record_delayed();
        }
        self.shared.stats.observe_occupancy(enqueued.occupancy);
        Ok(Submission::Queued)
    }

    /// Presents `frame` immediately on the calling thread, bypassing the
    /// mode, the buffer and the submission counters. Frames still queued
    /// for the consumer are not waited for.
    pub fn draw_frame_now(&mut self, frame: Frame<S>) -> Result<(), SyncError> {
        self.dispatch_input();
        self.present_now(frame, None)
    }

    fn present_now(
        &self,
        frame: Frame<S>,
        scheduled_at: Option<Instant>,
    ) -> Result<(), SyncError> {
        let info = self.frame_info(frame.sim_time(), scheduled_at);
        self.shared.present(frame, info)
    }

    fn frame_info(&self, sim_time: f64, scheduled_at: Option<Instant>) -> FrameInfo {
        FrameInfo {
            sim_time,
            mode: self.settings.mode,
            frame_rate: self.settings.pacing_rate(),
            real_time_scale: self.settings.real_time_scale,
            scheduled_at,
        }
    }

    /// Blocks until every queued frame has been presented, then reports any
    /// renderer failure from the consumer thread.
    pub fn flush(&mut self) -> Result<(), SyncError> {
        self.wait_for_consumer()
    }

    fn wait_for_consumer(&self) -> Result<(), SyncError> {
        if self.consumer.is_some() {
            self.shared.buffer.wait_idle()?;
        }
        self.surface_fault()
    }

    fn surface_fault(&self) -> Result<(), SyncError> {
        match self.shared.take_fault() {
            Some(err) => Err(SyncError::Render(err)),
            None => Ok(()),
        }
    }

    fn ensure_consumer(&mut self) -> Result<(), SyncError> {
        if self.consumer.is_none() {
            debug!("Starting frame consumer");
            self.consumer = Some(spawn_consumer(Arc::clone(&self.shared))?);
        }
        Ok(())
    }

    /// Drains and joins the consumer once RealTime no longer buffers. A
    /// renderer failure it left behind is still reported by the next call.
    fn retire_unneeded_consumer(&mut self) {
        if self.settings.mode == Mode::RealTime && self.settings.buffer_frames() > 0 {
            return;
        }
        let Some(consumer) = self.consumer.take() else {
            return;
        };
        if let Err(err) = self.shared.buffer.wait_idle() {
            warn!(error = %err, "Frame buffer closed while draining");
        }
        self.shared.buffer.close();
        if consumer.join().is_err() {
            error!("Frame consumer thread panicked");
        }
        self.shared.buffer.reopen();
        debug!("Frame consumer retired");
    }

    fn record_dropped(&self, frames: u64) {
        if frames == 0 {
            return;
        }
        self.shared.stats.record_dropped(frames);
        if let Some(metrics) = &self.metrics {
            metrics.inc_dropped(frames);
        }
    }

    pub fn mode(&self) -> Mode {
        self.settings.mode
    }

    /// Switches policy. Entering RealTime re-anchors the clock on the next
    /// frame; entering Sampling accepts the next frame immediately. Leaving
    /// RealTime blocks until queued frames are presented and stops the
    /// consumer thread.
    pub fn set_mode(&mut self, mode: Mode) {
        if mode == self.settings.mode {
            return;
        }
        info!(from = %self.settings.mode, to = %mode, "Switching delivery mode");
        match mode {
            Mode::RealTime => self.schedule.reset(),
            Mode::Sampling => self.sampler.reset(),
            Mode::PassThrough => {}
        }
        self.settings.mode = mode;
        self.retire_unneeded_consumer();
    }

    /// `None`, zero, negative or non-finite rates select the mode default:
    /// unbounded for PassThrough, 30 fps otherwise.
    pub fn set_desired_frame_rate(&mut self, rate: Option<f64>) {
        self.settings.desired_frame_rate = normalize_frame_rate(rate);
        self.apply_capacity();
    }

    /// The requested rate, `None` when the mode default applies.
    pub fn desired_frame_rate(&self) -> Option<f64> {
        self.settings.desired_frame_rate
    }

    /// Simulation units per real second; non-positive values select 1.0.
    pub fn set_real_time_scale(&mut self, scale: f64) {
        let scale = normalize_real_time_scale(scale);
        self.settings.real_time_scale = scale;
        self.schedule.set_scale(scale, Instant::now());
        debug!(scale, "Real-time scale changed");
    }

    pub fn real_time_scale(&self) -> f64 {
        self.settings.real_time_scale
    }

    /// `None` or a negative length selects the default; zero disables
    /// buffering so RealTime presents on the producer thread, once frames
    /// already queued have been presented.
    pub fn set_desired_buffer_length(&mut self, secs: Option<f64>) {
        self.settings.desired_buffer_secs = normalize_buffer_secs(secs);
        self.apply_capacity();
    }

    /// Requested buffer length in seconds, or the default if none was requested.
    pub fn desired_buffer_length(&self) -> f64 {
        self.settings.buffer_secs()
    }

    /// Buffer length after rounding to whole frames at the real-time rate.
    pub fn actual_buffer_length_secs(&self) -> f64 {
        self.settings.actual_buffer_secs()
    }

    pub fn actual_buffer_length_frames(&self) -> usize {
        self.settings.buffer_frames()
    }

    fn apply_capacity(&mut self) {
        let frames = self.settings.buffer_frames();
        self.shared.buffer.set_capacity(frames);
        debug!(
            buffer_frames = frames,
            buffer_secs = self.settings.actual_buffer_secs(),
            "Buffer resized"
        );
        self.retire_unneeded_consumer();
    }

    pub fn register_frame_controller(&mut self, controller: impl FrameController<S> + 'static) {
        self.shared.pipeline().add_controller(Box::new(controller));
    }

    pub fn register_decoration_generator(
        &mut self,
        generator: impl DecorationGenerator<S> + 'static,
    ) {
        self.shared.pipeline().add_generator(Box::new(generator));
    }

    pub fn register_event_listener(&mut self, listener: impl EventListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn frame_controller_count(&self) -> usize {
        self.shared.pipeline().controller_count()
    }

    pub fn event_listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Handle for posting user input from another thread. Input is delivered
    /// to listeners at the next `submit`, `draw_frame_now` or
    /// [`dispatch_input`](Self::dispatch_input).
    pub fn input_sender(&self) -> Sender<UserInput> {
        self.input_tx.clone()
    }

    /// Delivers all pending input to listeners in registration order.
    /// Returns the number of events taken from the queue.
    pub fn dispatch_input(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(input) = self.input_rx.try_recv() {
            let consumed = dispatch(&mut self.listeners, &input);
            trace!(?input, consumed, "User input dispatched");
            handled += 1;
        }
        handled
    }

    /// Mirrors submissions, drops and presentations into `metrics`.
    pub fn attach_metrics(&mut self, metrics: Arc<MetricsRecorder>) {
        self.shared.pipeline().set_metrics(Arc::clone(&metrics));
        self.metrics = Some(metrics);
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Writes a human-readable summary of the counters to `sink`.
    pub fn dump_stats<W: io::Write + ?Sized>(&self, sink: &mut W) -> io::Result<()> {
        self.shared.stats.dump(sink)
    }

    pub fn clear_stats(&self) {
        self.shared.stats.clear();
        debug!("Delivery statistics cleared");
    }
}

impl<S: Send + 'static> Drop for SyncEngine<S> {
    fn drop(&mut self) {
        self.shared.buffer.close();
        if let Some(consumer) = self.consumer.take() {
            if consumer.join().is_err() {
                error!("Frame consumer thread panicked");
            }
        }
        debug!("Frame synchronization engine stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use bildtakt_core::frame::{DecoratedFrame, Decoration};
    use parking_lot::Mutex;
    use tracing_test::traced_test;

    use super::*;
    use crate::observer::{FrameContext, Modifiers};
    use crate::renderer::RenderError;

    #[derive(Debug, Clone)]
    struct Presented {
        sim_time: f64,
        at: Instant,
        decorations: usize,
        camera: usize,
        thread: Option<String>,
    }

    #[derive(Clone, Default)]
    struct Log(Arc<Mutex<Vec<Presented>>>);

    impl Log {
        fn sim_times(&self) -> Vec<f64> {
            self.0.lock().iter().map(|p| p.sim_time).collect()
        }

        fn entries(&self) -> Vec<Presented> {
            self.0.lock().clone()
        }
    }

    #[derive(Default)]
    struct TestRenderer {
        log: Log,
        fail_at: Option<usize>,
        stall_first: Option<Duration>,
    }

    impl Renderer<u32> for TestRenderer {
        fn present(&mut self, frame: DecoratedFrame<u32>) -> Result<(), RenderError> {
            let mut log = self.log.0.lock();
            if self.fail_at == Some(log.len()) {
                self.fail_at = None;
                return Err("display lost".into());
            }
            if log.is_empty() {
                if let Some(stall) = self.stall_first {
                    thread::sleep(stall);
                }
            }
            log.push(Presented {
                sim_time: frame.sim_time(),
                at: Instant::now(),
                decorations: frame.decorations.len(),
                camera: frame.camera.len(),
                thread: thread::current().name().map(str::to_string),
            });
            Ok(())
        }
    }

    fn engine_with(renderer: TestRenderer, config: SyncConfig) -> (SyncEngine<u32>, Log) {
        let log = renderer.log.clone();
        let engine = SyncEngine::with_config(renderer, &config).unwrap();
        (engine, log)
    }

    fn engine(config: SyncConfig) -> (SyncEngine<u32>, Log) {
        engine_with(TestRenderer::default(), config)
    }

    fn real_time(rate: f64, buffer_secs: Option<f64>) -> SyncConfig {
        SyncConfig {
            mode: Mode::RealTime,
            desired_frame_rate: Some(rate),
            desired_buffer_secs: buffer_secs,
            ..SyncConfig::default()
        }
    }

    fn frame(i: u32, step: f64) -> Frame<u32> {
        Frame::new(f64::from(i) * step, i)
    }

    fn gaps(entries: &[Presented]) -> Vec<Duration> {
        entries
            .windows(2)
            .map(|w| w[1].at.duration_since(w[0].at))
            .collect()
    }

    #[test]
    fn pass_through_presents_every_frame_in_submission_order() {
        let (mut engine, log) = engine(SyncConfig::default());
        for i in 0..50 {
            assert_eq!(engine.submit(frame(i, 0.1)).unwrap(), Submission::Presented);
        }
        let expected: Vec<f64> = (0..50).map(|i| f64::from(i) * 0.1).collect();
        assert_eq!(log.sim_times(), expected);

        let stats = engine.stats();
        assert_eq!(stats.submitted, 50);
        assert_eq!(stats.rendered, 50);
        assert_eq!(stats.dropped, 0);
        assert!(engine.consumer.is_none());
    }

    #[test]
    fn pass_through_paces_to_the_desired_rate() {
        let config = SyncConfig {
            desired_frame_rate: Some(100.0),
            ..SyncConfig::default()
        };
        let (mut engine, log) = engine(config);
        for i in 0..6 {
            engine.submit(frame(i, 1.0)).unwrap();
        }
        for gap in gaps(&log.entries()) {
            assert!(gap >= Duration::from_millis(9), "gap {gap:?} shorter than pacing");
        }
        assert!(engine.stats().delayed >= 1);
    }

    #[test]
    fn sampling_drops_frames_without_blocking() {
        let config = SyncConfig {
            mode: Mode::Sampling,
            desired_frame_rate: Some(50.0),
            ..SyncConfig::default()
        };
        let (mut engine, log) = engine(config);

        let mut time_in_submit = Duration::ZERO;
        let mut presented = 0;
        for i in 0..150 {
            let started = Instant::now();
            if engine.submit(frame(i, 0.001)).unwrap() == Submission::Presented {
                presented += 1;
            }
            time_in_submit += started.elapsed();
            thread::sleep(Duration::from_millis(1));
        }

        let stats = engine.stats();
        assert_eq!(stats.submitted, 150);
        assert_eq!(stats.rendered + stats.dropped, 150);
        assert_eq!(stats.rendered, presented);
        assert!(presented >= 2);
        assert!(time_in_submit < Duration::from_millis(50), "{time_in_submit:?}");
        for gap in gaps(&log.entries()) {
            assert!(gap >= Duration::from_millis(18), "gap {gap:?} below interval");
        }
    }

    #[test]
    fn draw_frame_now_bypasses_sampling() {
        let config = SyncConfig {
            mode: Mode::Sampling,
            desired_frame_rate: Some(1.0),
            ..SyncConfig::default()
        };
        let (mut engine, log) = engine(config);
        assert_eq!(engine.submit(frame(0, 0.5)).unwrap(), Submission::Presented);
        assert_eq!(engine.submit(frame(1, 0.5)).unwrap(), Submission::Dropped);
        engine.draw_frame_now(frame(2, 0.5)).unwrap();

        assert_eq!(log.sim_times(), vec![0.0, 1.0]);
        let stats = engine.stats();
        assert_eq!(stats.submitted, 2);
        assert_eq!(stats.rendered, 2);
        assert_eq!(stats.dropped, 1);
    }

    #[test]
    fn buffer_sizing_follows_rate_and_length() {
        let (mut engine, _log) = engine(SyncConfig::default());
        assert_eq!(engine.actual_buffer_length_frames(), 5);
        assert_eq!(engine.desired_buffer_length(), 0.150);

        engine.set_desired_frame_rate(Some(60.0));
        assert_eq!(engine.actual_buffer_length_frames(), 9);
        engine.set_desired_frame_rate(Some(24.0));
        assert_eq!(engine.actual_buffer_length_frames(), 4);
        assert!((engine.actual_buffer_length_secs() - 4.0 / 24.0).abs() < 1e-12);

        engine.set_desired_buffer_length(Some(0.0));
        assert_eq!(engine.actual_buffer_length_frames(), 0);
        assert_eq!(engine.actual_buffer_length_secs(), 0.0);

        engine.set_desired_buffer_length(Some(-3.0));
        assert_eq!(engine.desired_buffer_length(), 0.150);
        assert_eq!(engine.actual_buffer_length_frames(), 4);

        engine.set_desired_frame_rate(Some(0.0));
        assert_eq!(engine.desired_frame_rate(), None);
        assert_eq!(engine.actual_buffer_length_frames(), 5);
        assert_eq!(engine.shared.buffer.capacity(), 5);
    }

    #[test]
    fn real_time_scale_falls_back_to_one() {
        let (mut engine, _log) = engine(SyncConfig::default());
        for bad in [0.0, -2.0, f64::NAN] {
            engine.set_real_time_scale(bad);
            assert_eq!(engine.real_time_scale(), 1.0);
        }
        engine.set_real_time_scale(2.5);
        assert_eq!(engine.real_time_scale(), 2.5);
    }

    #[test]
    fn unbuffered_real_time_presents_on_the_producer_thread() {
        let (mut engine, log) = engine(real_time(100.0, Some(0.0)));
        for i in 0..6 {
            assert_eq!(engine.submit(frame(i, 0.01)).unwrap(), Submission::Presented);
        }
        assert!(engine.consumer.is_none());

        let entries = log.entries();
        assert_eq!(entries.len(), 6);
        let span = entries[5].at.duration_since(entries[0].at);
        assert!(span >= Duration::from_millis(45), "span {span:?}");
        assert!(entries
            .iter()
            .all(|p| p.thread.as_deref() != Some(crate::delivery::CONSUMER_THREAD_NAME)));
        assert!(engine.stats().delayed >= 1);
    }

    #[test]
    fn buffered_real_time_follows_the_simulated_clock() {
        let (mut engine, log) = engine(real_time(100.0, None));
        assert_eq!(engine.actual_buffer_length_frames(), 15);
        for i in 0..40 {
            assert_eq!(engine.submit(frame(i, 0.01)).unwrap(), Submission::Queued);
        }
        engine.flush().unwrap();

        let entries = log.entries();
        assert_eq!(entries.len(), 40);
        assert!(entries
            .iter()
            .all(|p| p.thread.as_deref() == Some(crate::delivery::CONSUMER_THREAD_NAME)));
        let span = entries[39].at.duration_since(entries[0].at);
        assert!(span >= Duration::from_millis(370), "span {span:?}");
        assert!(span <= Duration::from_millis(600), "span {span:?}");

        let stats = engine.stats();
        assert_eq!(stats.dropped, 0);
        assert_eq!(stats.resyncs, 0);
        assert!(stats.max_occupancy >= 1 && stats.max_occupancy <= 15);
    }

    #[test]
    fn frames_sharing_a_slot_are_dropped_in_real_time() {
        let (mut engine, log) = engine(real_time(10.0, None));
        let outcomes: Vec<Submission> = (0..10)
            .map(|i| engine.submit(frame(i, 0.025)).unwrap())
            .collect();
        engine.flush().unwrap();

        // 0.0, 0.1 and 0.2 open new slots at 10 fps.
        assert_eq!(log.sim_times(), vec![0.0, 0.1, 0.2]);
        assert_eq!(
            outcomes.iter().filter(|o| **o == Submission::Dropped).count(),
            7
        );
    }

    #[traced_test]
    #[test]
    fn late_frame_resynchronizes_instead_of_catching_up() {
        let (mut engine, log) = engine(real_time(100.0, None));
        for i in 0..3 {
            engine.submit(frame(i, 0.01)).unwrap();
        }
        engine.flush().unwrap();
        thread::sleep(Duration::from_millis(100));

        assert_eq!(engine.submit(frame(3, 0.01)).unwrap(), Submission::Resynced);
        engine.submit(frame(4, 0.01)).unwrap();
        engine.submit(frame(5, 0.01)).unwrap();
        engine.flush().unwrap();

        let entries = log.entries();
        assert_eq!(entries.len(), 6);
        let after_resync = entries[5].at.duration_since(entries[3].at);
        assert!(after_resync >= Duration::from_millis(15), "{after_resync:?}");
        assert_eq!(engine.stats().resyncs, 1);
        assert!(logs_contain("resynchronizing"));
    }

    #[test]
    fn late_frame_discards_stale_buffered_frames() {
        let renderer = TestRenderer {
            stall_first: Some(Duration::from_millis(250)),
            ..TestRenderer::default()
        };
        let (mut engine, log) = engine_with(renderer, real_time(100.0, None));
        for i in 0..6 {
            engine.submit(frame(i, 0.01)).unwrap();
        }
        thread::sleep(Duration::from_millis(100));
        assert_eq!(engine.submit(frame(6, 0.01)).unwrap(), Submission::Resynced);
        engine.flush().unwrap();

        assert_eq!(log.sim_times(), vec![0.0, 6.0 * 0.01]);
        let stats = engine.stats();
        assert_eq!(stats.dropped, 5);
        assert_eq!(stats.resyncs, 1);
        assert_eq!(stats.rendered, 2);
    }

    #[test]
    fn leaving_real_time_keeps_submission_order() {
        let (mut engine, log) = engine(real_time(100.0, None));
        for i in 0..10 {
            engine.submit(frame(i, 0.01)).unwrap();
        }
        assert!(engine.consumer.is_some());
        engine.set_mode(Mode::PassThrough);
        assert!(engine.consumer.is_none());
        assert_eq!(log.sim_times().len(), 10);
        for i in 10..15 {
            assert_eq!(engine.submit(frame(i, 0.01)).unwrap(), Submission::Presented);
        }

        let times = log.sim_times();
        assert_eq!(times.len(), 15);
        assert!(times.windows(2).all(|w| w[0] < w[1]), "{times:?}");
    }

    #[test]
    fn consumer_runs_only_while_real_time_buffers() {
        let (mut engine, log) = engine(real_time(20.0, None));
        for i in 0..5 {
            engine.submit(frame(i, 0.05)).unwrap();
        }
        assert!(engine.consumer.is_some());

        engine.set_desired_buffer_length(Some(0.0));
        assert!(engine.consumer.is_none());
        assert_eq!(log.sim_times().len(), 5);
        assert_eq!(engine.submit(frame(5, 0.05)).unwrap(), Submission::Presented);
        assert!(engine.consumer.is_none());

        engine.set_desired_buffer_length(None);
        assert_eq!(engine.submit(frame(6, 0.05)).unwrap(), Submission::Queued);
        assert!(engine.consumer.is_some());
        engine.flush().unwrap();

        let times = log.sim_times();
        assert_eq!(times.len(), 7);
        assert!(times.windows(2).all(|w| w[0] < w[1]), "{times:?}");
        assert_eq!(
            log.entries()[6].thread.as_deref(),
            Some(crate::delivery::CONSUMER_THREAD_NAME)
        );
    }

    #[test]
    fn non_finite_sim_time_is_dropped_in_real_time() {
        let (mut engine, log) = engine(real_time(100.0, Some(0.0)));
        assert_eq!(
            engine.submit(Frame::new(f64::NAN, 0)).unwrap(),
            Submission::Dropped
        );
        assert_eq!(
            engine.submit(Frame::new(f64::INFINITY, 1)).unwrap(),
            Submission::Dropped
        );
        for i in 2..5 {
            assert_eq!(engine.submit(frame(i, 0.01)).unwrap(), Submission::Presented);
        }

        let expected: Vec<f64> = (2..5).map(|i| f64::from(i) * 0.01).collect();
        assert_eq!(log.sim_times(), expected);
        let stats = engine.stats();
        assert_eq!(stats.submitted, 5);
        assert_eq!(stats.dropped, 2);
        assert_eq!(stats.resyncs, 0);
    }

    struct Tagger;

    impl FrameController<u32> for Tagger {
        fn generate_controls(
            &mut self,
            ctx: &mut FrameContext<'_>,
            state: &u32,
            geometry: &mut Vec<Decoration>,
        ) {
            assert_eq!(geometry.len(), 1, "generators run before controllers");
            geometry.push(Decoration::Text {
                at: [0.0; 3],
                text: format!("step {state}"),
            });
            ctx.point_camera_at([0.0; 3], [0.0, 1.0, 0.0]);
        }
    }

    #[test]
    fn collaborators_decorate_each_frame() {
        let (mut engine, log) = engine(SyncConfig::default());
        engine.register_decoration_generator(|state: &u32, geometry: &mut Vec<Decoration>| {
            geometry.push(Decoration::Point {
                at: [f64::from(*state), 0.0, 0.0],
            })
        });
        engine.register_frame_controller(Tagger);
        assert_eq!(engine.frame_controller_count(), 1);

        for i in 0..3 {
            engine.submit(frame(i, 0.1)).unwrap();
        }
        for entry in log.entries() {
            assert_eq!(entry.decorations, 2);
            assert_eq!(entry.camera, 1);
        }
    }

    struct DropCounter(Arc<AtomicUsize>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl FrameController<u32> for DropCounter {
        fn generate_controls(
            &mut self,
            _ctx: &mut FrameContext<'_>,
            _state: &u32,
            _geometry: &mut Vec<Decoration>,
        ) {
        }
    }

    impl EventListener for DropCounter {}

    #[test]
    fn owned_collaborators_are_dropped_exactly_once() {
        let drops = Arc::new(AtomicUsize::new(0));
        let (mut engine, _log) = engine(real_time(100.0, None));
        engine.register_frame_controller(DropCounter(Arc::clone(&drops)));
        engine.register_frame_controller(DropCounter(Arc::clone(&drops)));
        engine.register_event_listener(DropCounter(Arc::clone(&drops)));
        for i in 0..3 {
            engine.submit(frame(i, 0.01)).unwrap();
        }
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        drop(engine);
        assert_eq!(drops.load(Ordering::SeqCst), 3);
    }

    #[derive(Clone, Default)]
    struct KeyLog(Arc<Mutex<Vec<u32>>>);

    struct KeyListener {
        log: KeyLog,
        consumes: Option<u32>,
    }

    impl EventListener for KeyListener {
        fn key_pressed(&mut self, key: u32, _modifiers: Modifiers) -> bool {
            self.log.0.lock().push(key);
            self.consumes == Some(key)
        }
    }

    #[test]
    fn input_reaches_listeners_in_registration_order() {
        let (mut engine, _log) = engine(SyncConfig::default());
        let first = KeyLog::default();
        let second = KeyLog::default();
        engine.register_event_listener(KeyListener {
            log: first.clone(),
            consumes: Some(27),
        });
        engine.register_event_listener(KeyListener {
            log: second.clone(),
            consumes: None,
        });
        assert_eq!(engine.event_listener_count(), 2);

        let input = engine.input_sender();
        for key in [65, 27] {
            input
                .send(UserInput::KeyPressed {
                    key,
                    modifiers: Modifiers::default(),
                })
                .unwrap();
        }
        engine.submit(frame(0, 0.1)).unwrap();

        assert_eq!(*first.0.lock(), vec![65, 27]);
        assert_eq!(*second.0.lock(), vec![65]);
        assert_eq!(engine.dispatch_input(), 0);
    }

    #[test]
    fn renderer_failure_reaches_the_producer() {
        let renderer = TestRenderer {
            fail_at: Some(2),
            ..TestRenderer::default()
        };
        let (mut engine, _log) = engine_with(renderer, SyncConfig::default());
        engine.submit(frame(0, 0.1)).unwrap();
        engine.submit(frame(1, 0.1)).unwrap();
        assert!(matches!(
            engine.submit(frame(2, 0.1)),
            Err(SyncError::Render(_))
        ));
    }

    #[test]
    fn consumer_failure_surfaces_on_flush() {
        let renderer = TestRenderer {
            fail_at: Some(0),
            ..TestRenderer::default()
        };
        let (mut engine, log) = engine_with(renderer, real_time(100.0, None));
        assert_eq!(engine.submit(frame(0, 0.01)).unwrap(), Submission::Queued);
        assert!(matches!(engine.flush(), Err(SyncError::Render(_))));
        assert!(engine.flush().is_ok());

        engine.submit(frame(1, 0.01)).unwrap();
        engine.flush().unwrap();
        assert_eq!(log.sim_times(), vec![0.01]);
    }

    #[test]
    fn metrics_mirror_delivery() {
        let metrics = Arc::new(MetricsRecorder::new().unwrap());
        let config = SyncConfig {
            mode: Mode::Sampling,
            desired_frame_rate: Some(1.0),
            ..SyncConfig::default()
        };
        let (mut engine, _log) = engine(config);
        engine.attach_metrics(Arc::clone(&metrics));
        for i in 0..4 {
            engine.submit(frame(i, 0.1)).unwrap();
        }
        assert_eq!(metrics.frames_submitted.get(), 4);
        assert_eq!(metrics.frames_rendered.get(), 1);
        assert_eq!(metrics.frames_dropped.get(), 3);
    }

    #[test]
    fn dump_reports_without_resetting_and_clear_is_idempotent() {
        let (mut engine, _log) = engine(SyncConfig::default());
        for i in 0..3 {
            engine.submit(frame(i, 0.1)).unwrap();
        }

        let mut out = Vec::new();
        engine.dump_stats(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("submitted:      3"), "{text}");
        assert_eq!(engine.stats().submitted, 3);

        engine.clear_stats();
        let cleared = engine.stats();
        engine.clear_stats();
        assert_eq!(engine.stats(), cleared);
        assert_eq!(cleared.submitted, 0);
        assert_eq!(cleared.rendered, 0);
    }
}
