/*!
# Bildtakt Simulator

A deterministic producer for exercising the synchronization engine without a
real physics backend or display.

## Key Components:
- **Virtual Clock:** simulated time with nanosecond precision.
- **Step Models:** fixed or seeded, jittered simulated-time steps.
- **Stall Injection:** seeded producer stalls that force real-time resyncs.
- **Scene:** a pendulum plus the generator and controller that decorate it.
- **Recording Renderer:** keeps every presented frame and a BLAKE3 digest.
*/

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use bildtakt_config::{BildtaktConfig, ProducerConfig};
use bildtakt_core::frame::Frame;
use bildtakt_core::stats::StatsSnapshot;
use bildtakt_engine::{Submission, SyncEngine};
use bildtakt_telemetry::MetricsRecorder;
use serde::Serialize;
use tracing::{debug, info, instrument};

pub mod error;
pub mod recorder;
pub mod scene;
pub mod stall;
pub mod step;
pub mod virtual_clock;

pub use error::SimulationError;
pub use recorder::{Presentations, RecordingRenderer};
pub use scene::{FollowBob, PendulumRod, PendulumState};

use stall::StallInjector;
use step::{FixedStep, JitteredStep, StepModel};
use virtual_clock::VirtualClock;

/// What one producer run did, independent of how the engine counted it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub frames_offered: usize,
    pub presented: usize,
    pub queued: usize,
    pub dropped: usize,
    pub resynced: usize,
    pub stalls: usize,
    pub final_sim_time: f64,
    pub wall_secs: f64,
    pub stopped_early: bool,
}

impl RunReport {
    fn count(&mut self, outcome: Submission) {
        match outcome {
            Submission::Presented => self.presented += 1,
            Submission::Queued => self.queued += 1,
            Submission::Dropped => self.dropped += 1,
            Submission::Resynced => self.resynced += 1,
        }
    }
}

/// Produces pendulum frames on a virtual clock.
pub struct Simulator {
    clock: VirtualClock,
    steps: Box<dyn StepModel>,
    stalls: StallInjector,
    work: Duration,
    step: u64,
}

impl Simulator {
    pub fn new(config: &ProducerConfig) -> Result<Self, SimulationError> {
        if !(config.step_secs.is_finite() && config.step_secs > 0.0) {
            return Err(SimulationError::InvalidConfig(format!(
                "step_secs must be positive, got {}",
                config.step_secs
            )));
        }
        if !(0.0..=1.0).contains(&config.stall_probability) {
            return Err(SimulationError::InvalidConfig(format!(
                "stall_probability must be within [0, 1], got {}",
                config.stall_probability
            )));
        }

        let steps: Box<dyn StepModel> = if config.step_jitter > 0.0 {
            Box::new(JitteredStep::new(
                config.step_secs,
                config.step_jitter,
                config.seed,
            ))
        } else {
            Box::new(FixedStep::new(config.step_secs))
        };

        Ok(Self {
            clock: VirtualClock::default(),
            steps,
            stalls: StallInjector::new(
                config.stall_probability,
                Duration::from_millis(config.stall_ms),
                config.seed,
            ),
            work: Duration::from_millis(config.work_ms),
            step: 0,
        })
    }

    pub fn clock(&self) -> &VirtualClock {
        &self.clock
    }

    /// Captures the state at the current simulated time, then advances.
    pub fn next_frame(&mut self) -> Frame<PendulumState> {
        let sim_time = self.clock.now_secs();
        let frame = Frame::new(sim_time, PendulumState::at(self.step, sim_time));
        self.step += 1;
        self.clock.advance_secs(self.steps.next_step());
        frame
    }

    /// Submits up to `frames` frames, spending the configured work time and
    /// stalls on each step, then flushes the engine.
    ///
    /// `stop` is checked before every step; setting it ends the run early.
    #[instrument(level = "info", name = "simulate", skip_all, fields(frames = frames))]
    pub fn run(
        &mut self,
        engine: &mut SyncEngine<PendulumState>,
        frames: usize,
        stop: &AtomicBool,
    ) -> Result<RunReport, SimulationError> {
        let started = Instant::now();
        let mut report = RunReport::default();

        for _ in 0..frames {
            if stop.load(Ordering::Relaxed) {
                info!(offered = report.frames_offered, "Simulation interrupted");
                report.stopped_early = true;
                break;
            }
            if !self.work.is_zero() {
                thread::sleep(self.work);
            }
            if let Some(stall) = self.stalls.next_stall() {
                debug!(
                    stall_ms = stall.as_millis() as u64,
                    step = self.step,
                    "Injected producer stall"
                );
                thread::sleep(stall);
                report.stalls += 1;
            }

            let outcome = engine.submit(self.next_frame())?;
            report.frames_offered += 1;
            report.count(outcome);
        }

        engine.flush()?;
        report.final_sim_time = self.clock.now_secs();
        report.wall_secs = started.elapsed().as_secs_f64();
        info!(
            offered = report.frames_offered,
            resynced = report.resynced,
            stalls = report.stalls,
            wall_secs = report.wall_secs,
            "Simulation finished"
        );
        Ok(report)
    }
}

/// Everything a finished scenario produced.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioOutcome {
    pub report: RunReport,
    pub stats: StatsSnapshot,
    /// Hex BLAKE3 digest of the presented sequence.
    pub digest: String,
    /// Prometheus exposition, when metrics are enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<String>,
    #[serde(skip)]
    pub summary: String,
}

/// Runs the pendulum scenario described by `config` against a recording
/// renderer.
pub fn run_scenario(
    config: &BildtaktConfig,
    stop: Arc<AtomicBool>,
) -> Result<ScenarioOutcome, SimulationError> {
    let (renderer, presentations) = RecordingRenderer::new();
    let mut engine: SyncEngine<PendulumState> = SyncEngine::with_config(renderer, &config.sync)?;
    engine.register_decoration_generator(PendulumRod);
    engine.register_frame_controller(FollowBob);

    let metrics = if config.telemetry.metrics.enabled {
        let recorder = Arc::new(MetricsRecorder::new()?);
        engine.attach_metrics(Arc::clone(&recorder));
        Some(recorder)
    } else {
        None
    };

    let mut simulator = Simulator::new(&config.producer)?;
    let report = simulator.run(&mut engine, config.producer.frame_count, &stop)?;

    let mut summary = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = engine.dump_stats(&mut summary);

    Ok(ScenarioOutcome {
        report,
        stats: engine.stats(),
        digest: presentations.digest(),
        metrics: metrics.map(|m| m.gather_metrics()).transpose()?,
        summary: String::from_utf8_lossy(&summary).into_owned(),
    })
}
