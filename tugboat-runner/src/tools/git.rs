//! Git-backed source control

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;
use tugboat_core::domain::release::ReleaseIdentifier;

use super::SourceControl;
use super::process::{ToolCommand, ToolOutput};

/// Source control operations through the `git` binary
#[derive(Debug, Clone)]
pub struct GitSourceControl {
    remote: String,
    workdir: Option<PathBuf>,
}

impl GitSourceControl {
    pub fn new(remote: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
            workdir: None,
        }
    }

    /// Operates on the repository at `workdir` instead of the current directory
    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    fn git(&self) -> ToolCommand {
        ToolCommand::program("git").current_dir(self.workdir.clone())
    }

    /// Runs a read-only git query, turning a non-zero exit into an error
    async fn query(&self, args: &[&str]) -> io::Result<String> {
        let output = self.git().args(args.iter().copied()).run().await?;
        if !output.success() {
            return Err(io::Error::other(format!(
                "git {} failed: {}",
                args.join(" "),
                output.failure_reason()
            )));
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl SourceControl for GitSourceControl {
    async fn current_branch(&self) -> io::Result<String> {
        let branch = self.query(&["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        let branch = branch.trim();

        if branch == "HEAD" {
            return Err(io::Error::other(
                "repository is in detached HEAD state; pass the branch name explicitly",
            ));
        }

        Ok(branch.to_string())
    }

    async fn list_tags(&self) -> io::Result<Vec<String>> {
        let tags = self.query(&["tag", "--list"]).await?;
        Ok(tags
            .lines()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn create_and_push_tag(
        &self,
        release: &ReleaseIdentifier,
        auth: Option<&Path>,
    ) -> io::Result<ToolOutput> {
        let tag = release.to_string();

        // Force-moving the tag keeps re-runs for the same commit idempotent.
        let tagged = self.git().args(["tag", "--force", tag.as_str()]).run().await?;
        if !tagged.success() {
            return Ok(tagged);
        }

        info!("Pushing tag {} to {}", tag, self.remote);
        let mut push = self.git();
        if let Some(store) = auth {
            // Reset inherited helpers, then read credentials only from the scoped store.
            push = push
                .args(["-c", "credential.helper="])
                .arg("-c")
                .arg(format!("credential.helper=store --file={}", store.display()));
        }

        push.args(["push", "--force", self.remote.as_str()])
            .arg(format!("refs/tags/{}", tag))
            .run()
            .await
    }
}
