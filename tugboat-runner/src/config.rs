//! Runner configuration
//!
//! Defines the static settings of a deployment pipeline: who is being
//! deployed (organization, application, image repository), where environment
//! configuration and secrets live, which external tools to invoke, and the
//! timing limits of a run.

use anyhow::Context;
use std::path::PathBuf;
use std::time::Duration;
use tugboat_core::domain::parameters::BuildParameters;

use crate::service::registry;

/// Runner configuration
///
/// Loaded once per process. Per-run inputs live in `BuildParameters`, not here.
#[derive(Debug, Clone)]
pub struct Config {
    /// Organization identifier handed to the deploy tool
    pub organization: String,

    /// Application identifier handed to the deploy tool
    pub application: String,

    /// Image repository the build stage pushes to (without tag)
    pub image_repository: String,

    /// Branch whose runs tag releases and deploy to development
    pub primary_branch: String,

    /// Environment targeted by non-production runs on the primary branch
    pub development_environment: String,

    /// Production environments used when a run names none
    pub default_environments: Vec<String>,

    /// Directory holding per-environment configuration files
    pub config_dir: PathBuf,

    /// Directory holding secrets, one file per secret name
    pub secrets_dir: PathBuf,

    /// Directory for the version file and scoped credential files
    pub state_dir: PathBuf,

    /// Deploy tool command line (program plus leading arguments)
    pub deploy_tool: Vec<String>,

    /// Test runner command line
    pub test_command: Vec<String>,

    /// Image build/push tool command line
    pub image_tool: Vec<String>,

    /// Git remote that release tags are pushed to
    pub git_remote: String,

    /// Wait between a successful deploy and its status verification
    pub status_grace_period: Duration,

    /// Wall-clock limit for a whole run
    pub run_timeout: Duration,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Every variable is optional; unset variables fall back to the defaults:
    /// - TUGBOAT_ORGANIZATION, TUGBOAT_APPLICATION, TUGBOAT_IMAGE_REPOSITORY
    /// - TUGBOAT_PRIMARY_BRANCH (default: main)
    /// - TUGBOAT_DEVELOPMENT_ENVIRONMENT (default: development)
    /// - TUGBOAT_DEFAULT_ENVIRONMENTS (space-separated)
    /// - TUGBOAT_CONFIG_DIR, TUGBOAT_SECRETS_DIR, TUGBOAT_STATE_DIR
    /// - TUGBOAT_DEPLOY_TOOL, TUGBOAT_TEST_COMMAND, TUGBOAT_IMAGE_TOOL
    /// - TUGBOAT_GIT_REMOTE (default: origin)
    /// - TUGBOAT_STATUS_GRACE_SECONDS (default: 10)
    /// - TUGBOAT_RUN_TIMEOUT_SECONDS (default: 3600)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let string = |key: &str, default: String| lookup(key).unwrap_or(default);
        let path = |key: &str, default: PathBuf| lookup(key).map(PathBuf::from).unwrap_or(default);
        let command = |key: &str, default: Vec<String>| -> anyhow::Result<Vec<String>> {
            match lookup(key) {
                Some(value) => shell_words::split(&value)
                    .with_context(|| format!("{} is not a valid command line", key)),
                None => Ok(default),
            }
        };
        let seconds = |key: &str, default: Duration| -> anyhow::Result<Duration> {
            match lookup(key) {
                Some(value) => value
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .with_context(|| format!("{} must be a number of seconds", key)),
                None => Ok(default),
            }
        };

        let default_environments = lookup("TUGBOAT_DEFAULT_ENVIRONMENTS")
            .map(|list| BuildParameters::parse_environments(&list))
            .unwrap_or(defaults.default_environments);

        Ok(Self {
            organization: string("TUGBOAT_ORGANIZATION", defaults.organization),
            application: string("TUGBOAT_APPLICATION", defaults.application),
            image_repository: string("TUGBOAT_IMAGE_REPOSITORY", defaults.image_repository),
            primary_branch: string("TUGBOAT_PRIMARY_BRANCH", defaults.primary_branch),
            development_environment: string(
                "TUGBOAT_DEVELOPMENT_ENVIRONMENT",
                defaults.development_environment,
            ),
            default_environments,
            config_dir: path("TUGBOAT_CONFIG_DIR", defaults.config_dir),
            secrets_dir: path("TUGBOAT_SECRETS_DIR", defaults.secrets_dir),
            state_dir: path("TUGBOAT_STATE_DIR", defaults.state_dir),
            deploy_tool: command("TUGBOAT_DEPLOY_TOOL", defaults.deploy_tool)?,
            test_command: command("TUGBOAT_TEST_COMMAND", defaults.test_command)?,
            image_tool: command("TUGBOAT_IMAGE_TOOL", defaults.image_tool)?,
            git_remote: string("TUGBOAT_GIT_REMOTE", defaults.git_remote),
            status_grace_period: seconds(
                "TUGBOAT_STATUS_GRACE_SECONDS",
                defaults.status_grace_period,
            )?,
            run_timeout: seconds("TUGBOAT_RUN_TIMEOUT_SECONDS", defaults.run_timeout)?,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, value) in [
            ("organization", &self.organization),
            ("application", &self.application),
            ("image_repository", &self.image_repository),
            ("git_remote", &self.git_remote),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("{} cannot be empty", name);
            }
        }

        if self.primary_branch.is_empty() || self.primary_branch.contains(char::is_whitespace) {
            anyhow::bail!("primary_branch must be a non-empty branch name without whitespace");
        }

        registry::validate_name(&self.development_environment)
            .context("development_environment is not a valid environment name")?;

        for (name, command) in [
            ("deploy_tool", &self.deploy_tool),
            ("test_command", &self.test_command),
            ("image_tool", &self.image_tool),
        ] {
            if command.is_empty() {
                anyhow::bail!("{} cannot be empty", name);
            }
        }

        if self.run_timeout.is_zero() {
            anyhow::bail!("run_timeout must be greater than 0");
        }

        Ok(())
    }

    /// Single-line file holding the release resolved for the current run
    pub fn version_file(&self) -> PathBuf {
        self.state_dir.join("release-version")
    }

    /// Scoped cluster access file handed to the deploy tool
    pub fn cluster_credential_path(&self) -> PathBuf {
        self.state_dir.join("kubeconfig")
    }

    /// Scoped git credential store used while pushing tags
    pub fn source_control_credential_path(&self) -> PathBuf {
        self.state_dir.join("git-credentials")
    }

    /// Scoped registry auth file used while pushing images
    pub fn cloud_credential_path(&self) -> PathBuf {
        self.state_dir.join("docker").join("config.json")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            organization: "acme".to_string(),
            application: "service".to_string(),
            image_repository: "registry.example.com/acme/service".to_string(),
            primary_branch: "main".to_string(),
            development_environment: "development".to_string(),
            default_environments: vec![
                "prod-us-east".to_string(),
                "prod-eu-west".to_string(),
                "prod-ap-southeast".to_string(),
            ],
            config_dir: PathBuf::from("deploy"),
            secrets_dir: PathBuf::from("/run/secrets"),
            state_dir: PathBuf::from(".tugboat"),
            deploy_tool: vec!["deployctl".to_string()],
            test_command: vec!["make".to_string(), "test".to_string()],
            image_tool: vec!["docker".to_string()],
            git_remote: "origin".to_string(),
            status_grace_period: Duration::from_secs(10),
            run_timeout: Duration::from_secs(3600), // 1 hour
        }
    }
}
