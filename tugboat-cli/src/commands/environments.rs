//! Environments command handler
//!
//! Shows, for each environment, whether its configuration file exists and
//! whether its cluster credential is available.

use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use serde::Serialize;
use std::path::PathBuf;
use tugboat_runner::Config;
use tugboat_runner::credentials::{DirectorySecretStore, SecretStore};
use tugboat_runner::service::EnvironmentRegistry;

use super::{OutputFormat, environment_list};

/// Arguments of `tugboat environments`
#[derive(Args, Debug)]
pub struct EnvironmentsArgs {
    /// Space-separated environments to inspect; defaults to the configured list
    #[arg(long, env = "DEPLOY_ENVIRONMENTS")]
    pub environments: Option<String>,
}

/// Registry binding of one environment, as reported to the user
#[derive(Debug, Serialize)]
struct EnvironmentReport {
    name: String,
    config_path: PathBuf,
    config_present: bool,
    credential: Option<String>,
    credential_available: bool,
}

/// Handle `tugboat environments`
pub fn handle_environments_command(
    args: EnvironmentsArgs,
    config: Config,
    output: OutputFormat,
) -> Result<()> {
    let names = environment_list(args.environments.as_deref(), &config);
    let registry = EnvironmentRegistry::new(&config.config_dir, &names)?;
    let secrets = DirectorySecretStore::new(config.secrets_dir.clone());

    let reports = inspect(&registry, &secrets)?;

    match output {
        OutputFormat::Human => print_reports(&reports),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
    }

    Ok(())
}

fn inspect(
    registry: &EnvironmentRegistry,
    secrets: &dyn SecretStore,
) -> Result<Vec<EnvironmentReport>> {
    registry
        .environments()
        .iter()
        .map(|environment| -> Result<EnvironmentReport> {
            let binding = registry.resolve(&environment.name);
            let credential_available = match &binding.credential {
                Some(handle) => secrets
                    .secret(handle.as_str())
                    .with_context(|| format!("Failed to read credential '{}'", handle))?
                    .is_some(),
                None => false,
            };

            Ok(EnvironmentReport {
                name: environment.name.clone(),
                config_path: environment.config_path.clone(),
                config_present: binding.config_present,
                credential: binding.credential.map(|c| c.to_string()),
                credential_available,
            })
        })
        .collect()
}

fn print_reports(reports: &[EnvironmentReport]) {
    if reports.is_empty() {
        println!("{}", "No environments selected.".yellow());
        return;
    }

    println!("{}", format!("{} environment(s):", reports.len()).bold());
    println!();
    for report in reports {
        println!("  {} {}", "▸".cyan(), report.name.bold());
        println!(
            "    Config:       {} {}",
            report.config_path.display().to_string().dimmed(),
            if report.config_present {
                "present".green()
            } else {
                "missing (deploy will be skipped)".yellow()
            }
        );
        println!(
            "    Credential:   {} {}",
            report.credential.as_deref().unwrap_or("-"),
            if report.credential_available {
                "available".green()
            } else {
                "not found".red()
            }
        );
        println!();
    }
}
