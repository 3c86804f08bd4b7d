//! Version command handler

use anyhow::Result;
use colored::*;
use tugboat_runner::{Config, PipelineController};

use super::OutputFormat;
use super::run::ReleaseArgs;

/// Handle `tugboat version`
///
/// Resolves the release from the repository tags exactly as a run would,
/// without writing the version file or touching any other state.
pub async fn handle_version_command(
    args: ReleaseArgs,
    config: Config,
    output: OutputFormat,
) -> Result<()> {
    let parameters = args.parameters();
    let controller = PipelineController::from_config(config);
    let release = controller.resolve_release(&parameters).await?;

    match output {
        OutputFormat::Human => println!("{}", release.to_string().bold()),
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({
                "release": release,
                "production": parameters.production,
            })
        ),
    }

    Ok(())
}
