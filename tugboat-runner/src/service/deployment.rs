//! Deployment executor
//!
//! Deploys a release to a single environment:
//! - Skips environments without a configuration file
//! - Materializes the environment's cluster credential into the scoped slot
//! - Invokes the deploy tool, waits the grace period, verifies status
//! - Erases the credential on every exit path
//!
//! The executor owns the only cluster credential slot of a run, and `deploy`
//! takes `&mut self`, so environments are deployed strictly one at a time.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tugboat_core::domain::outcome::DeploymentOutcome;
use tugboat_core::domain::release::ReleaseIdentifier;

use crate::config::Config;
use crate::credentials::{CredentialSlot, SecretStore};
use crate::service::registry::EnvironmentRegistry;
use crate::tools::{DeployRequest, DeployTool};

/// Deploys releases to registered environments, one at a time
pub struct DeploymentExecutor {
    registry: EnvironmentRegistry,
    tool: Arc<dyn DeployTool>,
    secrets: Arc<dyn SecretStore>,
    slot: CredentialSlot,
    organization: String,
    application: String,
    grace_period: Duration,
}

impl DeploymentExecutor {
    /// Creates an executor for the environments in `registry`
    ///
    /// Organization, application, grace period and the credential slot path
    /// are taken from `config`.
    pub fn new(
        registry: EnvironmentRegistry,
        tool: Arc<dyn DeployTool>,
        secrets: Arc<dyn SecretStore>,
        config: &Config,
    ) -> Self {
        Self {
            registry,
            tool,
            secrets,
            slot: CredentialSlot::new(config.cluster_credential_path()),
            organization: config.organization.clone(),
            application: config.application.clone(),
            grace_period: config.status_grace_period,
        }
    }

    pub fn registry(&self) -> &EnvironmentRegistry {
        &self.registry
    }

    /// Deploys `release` to one environment
    ///
    /// Never returns an error: every problem is reported as
    /// [`DeploymentOutcome::Failed`], and a missing configuration file as
    /// [`DeploymentOutcome::SkippedMissingConfig`].
    pub async fn deploy(
        &mut self,
        environment: &str,
        release: &ReleaseIdentifier,
        extra_args: &[String],
    ) -> DeploymentOutcome {
        let binding = self.registry.resolve(environment);

        if !binding.config_present {
            warn!(
                "No configuration for environment '{}', skipping deployment",
                environment
            );
            return DeploymentOutcome::SkippedMissingConfig {
                environment: environment.to_string(),
            };
        }

        let failed = |reason: String| {
            error!("Deployment to '{}' failed: {}", environment, reason);
            DeploymentOutcome::Failed {
                environment: environment.to_string(),
                reason,
            }
        };

        let Some(handle) = binding.credential else {
            return failed("no credential registered for environment".to_string());
        };

        let secret = match self.secrets.secret(handle.as_str()) {
            Ok(Some(secret)) => secret,
            Ok(None) => return failed(format!("credential '{}' not found", handle)),
            Err(e) => return failed(format!("failed to read credential '{}': {}", handle, e)),
        };

        let context = match self.slot.acquire(&secret) {
            Ok(context) => context,
            Err(e) => return failed(format!("failed to materialize credential: {}", e)),
        };

        let request = DeployRequest {
            environment,
            organization: &self.organization,
            application: &self.application,
            release,
            extra_args,
        };
        let result =
            deploy_and_verify(self.tool.as_ref(), &request, context.path(), self.grace_period)
                .await;
        drop(context);

        match result {
            Ok(()) => {
                info!("Deployed {} to '{}'", release, environment);
                DeploymentOutcome::Deployed {
                    environment: environment.to_string(),
                }
            }
            Err(reason) => failed(reason),
        }
    }
}

/// Runs the deploy invocation followed by the status verification
async fn deploy_and_verify(
    tool: &dyn DeployTool,
    request: &DeployRequest<'_>,
    access: &Path,
    grace_period: Duration,
) -> Result<(), String> {
    info!(
        "Deploying {} to '{}' ({}/{})",
        request.release, request.environment, request.organization, request.application
    );

    let deployed = tool
        .deploy(request, access)
        .await
        .map_err(|e| format!("deploy could not be started: {}", e))?;
    if !deployed.success() {
        return Err(format!("deploy failed with {}", deployed.failure_reason()));
    }

    if !grace_period.is_zero() {
        debug!(
            "Waiting {:?} before checking status of '{}'",
            grace_period, request.environment
        );
        tokio::time::sleep(grace_period).await;
    }

    let status = tool
        .status(request.environment, access)
        .await
        .map_err(|e| format!("status check could not be started: {}", e))?;
    if !status.success() {
        return Err(format!("status check failed with {}", status.failure_reason()));
    }

    Ok(())
}
