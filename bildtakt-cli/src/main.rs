//! ## bildtakt-cli
//! **Command-line front end**
//!
//! Runs the simulated producer against the synchronization engine and
//! reports delivery statistics, or validates a configuration file.

use clap::Parser;

mod commands;
mod error;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<(), error::CliError> {
    let cli = Cli::parse();
    commands::run_command(cli).await
}
