//! Command-backed test runner and image builder

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;
use tugboat_core::domain::release::ReleaseIdentifier;

use super::process::{ToolCommand, ToolOutput};
use super::BuildTool;

/// Runs the configured test command and a docker-compatible image tool
#[derive(Debug, Clone)]
pub struct CommandBuildTool {
    test_command: Vec<String>,
    image_tool: Vec<String>,
    workdir: Option<PathBuf>,
}

impl CommandBuildTool {
    /// # Arguments
    /// * `test_command` - Test runner command line (e.g. `make test`)
    /// * `image_tool` - Image tool command line accepting `build` and `push` (e.g. `docker`)
    pub fn new(test_command: Vec<String>, image_tool: Vec<String>) -> Self {
        Self {
            test_command,
            image_tool,
            workdir: None,
        }
    }

    /// Runs every command inside `workdir` instead of the current directory
    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    fn image_command(&self, registry_auth: Option<&Path>) -> io::Result<ToolCommand> {
        let mut command = ToolCommand::new(&self.image_tool)?.current_dir(self.workdir.clone());
        // Docker reads `config.json` from the directory named by DOCKER_CONFIG.
        if let Some(dir) = registry_auth.and_then(Path::parent) {
            command = command.env("DOCKER_CONFIG", dir);
        }
        Ok(command)
    }
}

#[async_trait]
impl BuildTool for CommandBuildTool {
    async fn run_tests(&self) -> io::Result<ToolOutput> {
        ToolCommand::new(&self.test_command)?
            .current_dir(self.workdir.clone())
            .run()
            .await
    }

    async fn build_and_push_image(
        &self,
        repository: &str,
        release: &ReleaseIdentifier,
        registry_auth: Option<&Path>,
    ) -> io::Result<ToolOutput> {
        let image = format!("{}:{}", repository, release);

        info!("Building image {}", image);
        let built = self
            .image_command(registry_auth)?
            .args(["build", "-t", image.as_str(), "."])
            .run()
            .await?;
        if !built.success() {
            return Ok(built);
        }

        info!("Pushing image {}", image);
        self.image_command(registry_auth)?
            .args(["push", image.as_str()])
            .run()
            .await
    }
}
