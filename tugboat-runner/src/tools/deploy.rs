//! Command-backed deploy tool

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};

use super::process::{ToolCommand, ToolOutput};
use super::{DeployRequest, DeployTool};

/// Invokes the deploy tool as
/// `<tool> deploy --environment E --org O --app A --version V [extra...]` and
/// `<tool> status --environment E`, with `KUBECONFIG` pointing at the
/// materialized cluster credential.
#[derive(Debug, Clone)]
pub struct CommandDeployTool {
    command: Vec<String>,
    workdir: Option<PathBuf>,
}

impl CommandDeployTool {
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            workdir: None,
        }
    }

    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    fn base(&self, access: &Path) -> io::Result<ToolCommand> {
        Ok(ToolCommand::new(&self.command)?
            .current_dir(self.workdir.clone())
            .env("KUBECONFIG", access))
    }
}

#[async_trait]
impl DeployTool for CommandDeployTool {
    async fn deploy(&self, request: &DeployRequest<'_>, access: &Path) -> io::Result<ToolOutput> {
        self.base(access)?
            .args(["deploy", "--environment", request.environment])
            .args(["--org", request.organization])
            .args(["--app", request.application])
            .arg("--version")
            .arg(request.release.to_string())
            .args(request.extra_args.iter().cloned())
            .run()
            .await
    }

    async fn status(&self, environment: &str, access: &Path) -> io::Result<ToolOutput> {
        self.base(access)?
            .args(["status", "--environment", environment])
            .run()
            .await
    }
}
