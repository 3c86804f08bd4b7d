//! External tool contracts
//!
//! Everything that leaves the process goes through one of these traits: the
//! test runner and image builder ([`BuildTool`]), source control
//! ([`SourceControl`]) and the cluster deploy tool ([`DeployTool`]). The
//! command-backed implementations live in the submodules; tests substitute
//! recording fakes.

mod build;
mod deploy;
mod git;
mod process;

pub use build::CommandBuildTool;
pub use deploy::CommandDeployTool;
pub use git::GitSourceControl;
pub use process::{ToolCommand, ToolOutput};

use async_trait::async_trait;
use std::io;
use std::path::Path;
use tugboat_core::domain::release::ReleaseIdentifier;

/// Arguments of a single deploy invocation
#[derive(Debug, Clone, Copy)]
pub struct DeployRequest<'a> {
    pub environment: &'a str,
    pub organization: &'a str,
    pub application: &'a str,
    pub release: &'a ReleaseIdentifier,
    pub extra_args: &'a [String],
}

/// Test runner and container image builder
#[async_trait]
pub trait BuildTool: Send + Sync {
    /// Runs the project's test suite
    async fn run_tests(&self) -> io::Result<ToolOutput>;

    /// Builds the image and pushes it as `repository:release`
    ///
    /// # Arguments
    /// * `registry_auth` - Materialized registry credential, if any
    async fn build_and_push_image(
        &self,
        repository: &str,
        release: &ReleaseIdentifier,
        registry_auth: Option<&Path>,
    ) -> io::Result<ToolOutput>;
}

/// Source control queries and release tagging
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Name of the checked-out branch
    async fn current_branch(&self) -> io::Result<String>;

    /// All tag names in the repository
    async fn list_tags(&self) -> io::Result<Vec<String>>;

    /// Points the release tag at the current commit and pushes it
    ///
    /// Must be idempotent: tagging the same commit with the same release twice
    /// succeeds both times.
    async fn create_and_push_tag(
        &self,
        release: &ReleaseIdentifier,
        auth: Option<&Path>,
    ) -> io::Result<ToolOutput>;
}

/// Cluster deploy tool
#[async_trait]
pub trait DeployTool: Send + Sync {
    /// Deploys a release to one environment
    ///
    /// # Arguments
    /// * `access` - Materialized cluster credential for the environment
    async fn deploy(&self, request: &DeployRequest<'_>, access: &Path) -> io::Result<ToolOutput>;

    /// Queries the deployment status of one environment
    async fn status(&self, environment: &str, access: &Path) -> io::Result<ToolOutput>;
}
