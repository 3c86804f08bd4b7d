//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod environments;
mod run;
mod version;

pub use environments::EnvironmentsArgs;
pub use run::{ReleaseArgs, RunArgs};

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use tracing::debug;
use tugboat_runner::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Execute a pipeline run
    Run(RunArgs),
    /// Print the release a run would use, without side effects
    Version(ReleaseArgs),
    /// Show configuration and credential status of environments
    Environments(EnvironmentsArgs),
}

/// How command results are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
/// * `output` - The requested output format
pub async fn handle_command(command: Commands, output: OutputFormat) -> Result<()> {
    let config = load_config()?;

    match command {
        Commands::Run(args) => run::handle_run_command(args, config, output).await,
        Commands::Version(args) => version::handle_version_command(args, config, output).await,
        Commands::Environments(args) => {
            environments::handle_environments_command(args, config, output)
        }
    }
}

/// Loads and validates the runner configuration from the environment
fn load_config() -> Result<Config> {
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    debug!("Loaded configuration: {:?}", config);
    Ok(config)
}

/// Environment list from the command line, or the configured default
///
/// An empty or blank list counts as not given.
fn environment_list(list: Option<&str>, config: &Config) -> Vec<String> {
    match list.filter(|list| !list.trim().is_empty()) {
        Some(list) => tugboat_core::domain::parameters::BuildParameters::parse_environments(list),
        None => config.default_environments.clone(),
    }
}
