use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bildtakt_config::{BildtaktConfig, ConfigError};
use bildtakt_core::mode::Mode;
use bildtakt_simulator::run_scenario;
use bildtakt_telemetry::EventLogger;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use crate::error::CliError;

#[derive(Parser)]
#[command(name = "bildtakt", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Drive the simulated pendulum through the synchronization engine
    Simulate(SimulateArgs),
    /// Load and validate configuration, then print the effective values
    CheckConfig(CheckConfigArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    PassThrough,
    Sampling,
    RealTime,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::PassThrough => Mode::PassThrough,
            ModeArg::Sampling => Mode::Sampling,
            ModeArg::RealTime => Mode::RealTime,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum StatsFormat {
    #[default]
    Text,
    Yaml,
}

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Configuration file; defaults to config/bildtakt.yaml plus environment
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,
    /// Desired frame rate in frames per second
    #[arg(long)]
    pub fps: Option<f64>,
    /// Simulation seconds per real second
    #[arg(long)]
    pub scale: Option<f64>,
    /// Desired real-time buffer length in seconds; 0 disables buffering
    #[arg(long)]
    pub buffer: Option<f64>,
    /// Number of frames to produce
    #[arg(long)]
    pub frames: Option<usize>,
    #[arg(long)]
    pub seed: Option<u64>,
    /// Wall time each producer step costs, in milliseconds
    #[arg(long)]
    pub work_ms: Option<u64>,
    #[arg(long)]
    pub stall_probability: Option<f64>,
    #[arg(long, value_enum, default_value_t = StatsFormat::Text)]
    pub format: StatsFormat,
    /// Fail unless the presented sequence hashes to this digest
    #[arg(long)]
    pub expect_digest: Option<String>,
}

impl SimulateArgs {
    /// Command-line values win over every configuration layer.
    fn apply(&self, config: &mut BildtaktConfig) {
        if let Some(mode) = self.mode {
            config.sync.mode = mode.into();
        }
        if self.fps.is_some() {
            config.sync.desired_frame_rate = self.fps;
        }
        if let Some(scale) = self.scale {
            config.sync.real_time_scale = scale;
        }
        if self.buffer.is_some() {
            config.sync.desired_buffer_secs = self.buffer;
        }
        if let Some(frames) = self.frames {
            config.producer.frame_count = frames;
        }
        if let Some(seed) = self.seed {
            config.producer.seed = seed;
        }
        if let Some(work_ms) = self.work_ms {
            config.producer.work_ms = work_ms;
        }
        if let Some(probability) = self.stall_probability {
            config.producer.stall_probability = probability;
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct CheckConfigArgs {
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

pub async fn run_command(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Simulate(args) => simulate(args).await,
        Commands::CheckConfig(args) => check_config(args),
    }
}

fn load_config(path: Option<&Path>) -> Result<BildtaktConfig, ConfigError> {
    match path {
        Some(path) => BildtaktConfig::load_from_path(path),
        None => BildtaktConfig::load(),
    }
}

async fn simulate(args: SimulateArgs) -> Result<(), CliError> {
    let mut config = load_config(args.config.as_deref())?;
    args.apply(&mut config);
    config.check()?;
    EventLogger::init(&config.telemetry.log_level);
    info!(
        mode = %config.sync.mode,
        frames = config.producer.frame_count,
        seed = config.producer.seed,
        "Starting simulation"
    );

    // The producer blocks on pacing, so it runs off the async workers.
    let stop = Arc::new(AtomicBool::new(false));
    let mut task = {
        let stop = Arc::clone(&stop);
        let config = config.clone();
        tokio::task::spawn_blocking(move || run_scenario(&config, stop))
    };

    let outcome = tokio::select! {
        joined = &mut task => joined??,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupt received; stopping producer");
            stop.store(true, Ordering::Relaxed);
            task.await??
        }
    };

    EventLogger::log_stats(config.sync.mode.as_str(), &outcome.stats);
    match args.format {
        StatsFormat::Text => {
            print!("{}", outcome.summary);
            println!("  digest:         {}", outcome.digest);
        }
        StatsFormat::Yaml => print!("{}", serde_yaml::to_string(&outcome)?),
    }

    match args.expect_digest {
        Some(expected) if expected != outcome.digest => Err(CliError::DigestMismatch {
            expected,
            actual: outcome.digest,
        }),
        _ => Ok(()),
    }
}

fn check_config(args: CheckConfigArgs) -> Result<(), CliError> {
    let config = load_config(args.config.as_deref())?;
    println!("Configuration OK");
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulate_args(argv: &[&str]) -> SimulateArgs {
        let mut full = vec!["bildtakt", "simulate"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Commands::Simulate(args) => args,
            Commands::CheckConfig(_) => panic!("parsed the wrong subcommand"),
        }
    }

    #[test]
    fn overrides_replace_configured_values() {
        let args = simulate_args(&[
            "--mode",
            "real-time",
            "--fps",
            "60",
            "--buffer",
            "0",
            "--frames",
            "12",
        ]);
        let mut config = BildtaktConfig::default();
        args.apply(&mut config);

        assert_eq!(config.sync.mode, Mode::RealTime);
        assert_eq!(config.sync.desired_frame_rate, Some(60.0));
        assert_eq!(config.sync.desired_buffer_secs, Some(0.0));
        assert_eq!(config.producer.frame_count, 12);
        assert_eq!(args.format, StatsFormat::Text);
    }

    #[test]
    fn absent_flags_keep_the_configuration() {
        let args = simulate_args(&["--format", "yaml"]);
        let mut config = BildtaktConfig::default();
        config.sync.desired_frame_rate = Some(24.0);
        args.apply(&mut config);

        assert_eq!(config.sync.desired_frame_rate, Some(24.0));
        assert_eq!(config.sync.mode, Mode::PassThrough);
        assert_eq!(args.format, StatsFormat::Yaml);
    }

    #[test]
    fn sentinel_overrides_restore_defaults() {
        let args = simulate_args(&["--fps", "0", "--scale", "0", "--buffer=-1"]);
        let mut config = BildtaktConfig::default();
        config.sync.desired_frame_rate = Some(24.0);
        args.apply(&mut config);

        assert!(config.check().is_ok());
        assert_eq!(config.sync.desired_frame_rate, None);
        assert_eq!(config.sync.real_time_scale, 1.0);
        assert_eq!(config.sync.desired_buffer_secs, None);
    }

    #[test]
    fn invalid_override_fails_validation() {
        let args = simulate_args(&["--stall-probability", "2.0"]);
        let mut config = BildtaktConfig::default();
        args.apply(&mut config);
        assert!(config.check().is_err());
    }
}
