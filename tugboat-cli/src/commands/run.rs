//! Run command handler
//!
//! Executes a pipeline run and prints its summary.

use anyhow::{Result, bail};
use clap::Args;
use colored::*;
use std::str::FromStr;
use tugboat_core::domain::outcome::DeploymentOutcome;
use tugboat_core::domain::parameters::{BuildParameters, CredentialRefs};
use tugboat_core::domain::release::{ParseReleaseError, ReleaseIdentifier};
use tugboat_core::domain::run::{PipelineRun, RunStatus};
use tugboat_runner::{Config, PipelineController};

use super::{OutputFormat, environment_list};

/// Release selection shared by `run` and `version`
#[derive(Args, Debug)]
pub struct ReleaseArgs {
    /// Deploy an existing release to production instead of building one
    #[arg(
        long,
        env = "PRODUCTION_DEPLOY",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    pub production: bool,

    /// Release to build or deploy (e.g. v1.4.2); resolved from tags when absent or empty
    #[arg(long, env = "RELEASE_VERSION")]
    pub release: Option<RequestedRelease>,
}

/// Value of `--release`
///
/// CI jobs pass an empty string for "no release requested", so an empty or
/// blank value parses to `None`. Anything else must be a valid identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedRelease(Option<ReleaseIdentifier>);

impl RequestedRelease {
    pub fn into_inner(self) -> Option<ReleaseIdentifier> {
        self.0
    }
}

impl FromStr for RequestedRelease {
    type Err = ParseReleaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self(None));
        }
        s.parse().map(|release| Self(Some(release)))
    }
}

/// Arguments of `tugboat run`
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub release: ReleaseArgs,

    /// Space-separated production environments, in rollout order
    #[arg(long, env = "DEPLOY_ENVIRONMENTS")]
    pub environments: Option<String>,

    /// Extra arguments passed to the deploy tool
    #[arg(long, env = "DEPLOY_EXTRA_ARGS", default_value = "", allow_hyphen_values = true)]
    pub extra_args: String,

    /// Secret holding the source control credential
    #[arg(long, env = "SCM_CREDENTIAL_ID", default_value = "git-credentials")]
    pub scm_credential: String,

    /// Secret holding the image registry credential
    #[arg(long, env = "CLOUD_CREDENTIAL_ID", default_value = "cloud-credentials")]
    pub cloud_credential: String,

    /// Branch being built; detected from the repository when absent
    #[arg(long, env = "BRANCH_NAME")]
    pub branch: Option<String>,
}

impl ReleaseArgs {
    pub fn parameters(&self) -> BuildParameters {
        BuildParameters {
            production: self.production,
            requested_release: self.release.clone().and_then(RequestedRelease::into_inner),
            ..BuildParameters::default()
        }
    }
}

impl RunArgs {
    /// Builds the immutable parameter bundle for the run
    pub fn parameters(&self, config: &Config) -> BuildParameters {
        BuildParameters {
            environments: environment_list(self.environments.as_deref(), config),
            extra_args: self.extra_args.clone(),
            credentials: CredentialRefs {
                source_control: self.scm_credential.clone(),
                cloud: self.cloud_credential.clone(),
            },
            ..self.release.parameters()
        }
    }
}

/// Handle `tugboat run`
///
/// Fails when the run is aborted so the process exits non-zero.
pub async fn handle_run_command(
    args: RunArgs,
    config: Config,
    output: OutputFormat,
) -> Result<()> {
    let parameters = args.parameters(&config);
    let controller = PipelineController::from_config(config);
    let run = controller.run(parameters, args.branch).await;

    match output {
        OutputFormat::Human => print_run_summary(&run),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&run)?),
    }

    if let RunStatus::Aborted { stage, reason } = &run.status {
        bail!("Pipeline run aborted in {}: {}", stage, reason);
    }

    Ok(())
}

/// Print a run summary
fn print_run_summary(run: &PipelineRun) {
    println!();
    println!("{} {}", "Pipeline run".bold(), run.id.to_string().bold());
    println!(
        "  Mode:         {}",
        if run.parameters.production {
            "production"
        } else {
            "build"
        }
    );
    println!(
        "  Branch:       {}",
        run.branch.as_deref().unwrap_or("-").cyan()
    );
    println!(
        "  Release:      {}",
        run.release
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".to_string())
            .cyan()
    );
    println!("  Status:       {}", colorize_status(&run.status));
    if let Some(finished_at) = run.finished_at {
        let elapsed = finished_at - run.started_at;
        println!(
            "  Duration:     {}",
            format!("{:.1}s", elapsed.num_milliseconds() as f64 / 1000.0).dimmed()
        );
    }

    if !run.outcomes.is_empty() {
        println!();
        println!("  {}", "Deployments:".bold());
        for outcome in &run.outcomes {
            println!("    {} {}", "▸".cyan(), colorize_outcome(outcome));
        }
    }

    let skipped = run.skipped();
    if !skipped.is_empty() {
        println!();
        println!(
            "  {} {}",
            "Skipped (no configuration):".yellow(),
            skipped.join(", ")
        );
    }
    println!();
}

/// Colorize run status for display
fn colorize_status(status: &RunStatus) -> ColoredString {
    match status {
        RunStatus::Running => "Running".yellow(),
        RunStatus::Done => "Done".green(),
        RunStatus::Aborted { stage, reason } => {
            format!("Aborted in {}: {}", stage, reason).red()
        }
    }
}

/// Colorize a deployment outcome for display
fn colorize_outcome(outcome: &DeploymentOutcome) -> ColoredString {
    match outcome {
        DeploymentOutcome::Deployed { .. } => outcome.to_string().green(),
        DeploymentOutcome::SkippedMissingConfig { .. } => outcome.to_string().yellow(),
        DeploymentOutcome::Failed { .. } => outcome.to_string().red(),
    }
}
