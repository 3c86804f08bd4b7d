//! Pipeline controller
//!
//! Sequences one pipeline run:
//!
//! ```text
//! Prepare ─┬─ non-production ─> BuildAndTest ─> TagAndPushRepo ─> DeployDevelopment
//!          └─ production ─────> DeployProduction (environments in order)
//! ```
//!
//! Tagging and the development deploy only happen on the primary branch, and
//! production deploys only run from it. The whole run is bounded by the
//! configured wall-clock limit; every fatal condition aborts immediately and
//! nothing is retried.

use std::sync::Arc;
use tracing::{error, info, warn};
use tugboat_core::domain::outcome::DeploymentOutcome;
use tugboat_core::domain::parameters::BuildParameters;
use tugboat_core::domain::release::ReleaseIdentifier;
use tugboat_core::domain::run::{PipelineRun, Stage};

use crate::config::Config;
use crate::credentials::{CredentialSlot, DirectorySecretStore, SecretStore};
use crate::error::{PipelineError, Result};
use crate::service::version;
use crate::service::{DeploymentExecutor, EnvironmentRegistry};
use crate::tools::{
    BuildTool, CommandBuildTool, CommandDeployTool, DeployTool, GitSourceControl, SourceControl,
    ToolOutput,
};

/// Everything `Prepare` establishes for the later stages
struct Prepared {
    branch: String,
    release: ReleaseIdentifier,
    registry: EnvironmentRegistry,
    extra_args: Vec<String>,
}

/// Drives pipeline runs against a set of external tools
pub struct PipelineController {
    config: Config,
    source: Arc<dyn SourceControl>,
    builder: Arc<dyn BuildTool>,
    deployer: Arc<dyn DeployTool>,
    secrets: Arc<dyn SecretStore>,
}

impl PipelineController {
    pub fn new(
        config: Config,
        source: Arc<dyn SourceControl>,
        builder: Arc<dyn BuildTool>,
        deployer: Arc<dyn DeployTool>,
        secrets: Arc<dyn SecretStore>,
    ) -> Self {
        Self {
            config,
            source,
            builder,
            deployer,
            secrets,
        }
    }

    /// Creates a controller backed by git, the configured commands and the
    /// secrets directory
    pub fn from_config(config: Config) -> Self {
        let source = GitSourceControl::new(config.git_remote.clone());
        let builder = CommandBuildTool::new(config.test_command.clone(), config.image_tool.clone());
        let deployer = CommandDeployTool::new(config.deploy_tool.clone());
        let secrets = DirectorySecretStore::new(config.secrets_dir.clone());

        Self::new(
            config,
            Arc::new(source),
            Arc::new(builder),
            Arc::new(deployer),
            Arc::new(secrets),
        )
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Executes a complete pipeline run
    ///
    /// # Arguments
    /// * `parameters` - Run parameters
    /// * `branch` - Branch being built; queried from source control when `None`
    ///
    /// # Returns
    /// The run record, either `Done` or `Aborted` at the stage it reached
    pub async fn run(&self, parameters: BuildParameters, branch: Option<String>) -> PipelineRun {
        let mut run = PipelineRun::new(parameters);
        info!(
            "Starting pipeline run {} (production: {})",
            run.id, run.parameters.production
        );

        let limit = self.config.run_timeout;
        let result = match tokio::time::timeout(limit, self.drive(&mut run, branch)).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout(limit)),
        };

        match result {
            Ok(()) => {
                run.finish();
                info!("Pipeline run {} completed", run.id);
            }
            Err(e) => {
                if e.is_timeout() {
                    error!(
                        "Pipeline run {} exceeded {:?} in {}; running tools were killed",
                        run.id, limit, run.stage
                    );
                } else {
                    error!("Pipeline run {} aborted in {}: {}", run.id, run.stage, e);
                }
                run.abort(e.to_string());
            }
        }

        let skipped = run.skipped();
        if !skipped.is_empty() {
            warn!("Skipped environments without configuration: {}", skipped.join(", "));
        }

        run
    }

    /// Resolves the release a run with these parameters would use
    ///
    /// Only reads tags; has no side effects.
    pub async fn resolve_release(&self, parameters: &BuildParameters) -> Result<ReleaseIdentifier> {
        let tags = self
            .source
            .list_tags()
            .await
            .map_err(|e| PipelineError::tool_failure("listing tags", e.to_string()))?;

        let latest = ReleaseIdentifier::latest(&tags);
        match &latest {
            Some(latest) => info!("Latest release tag: {}", latest),
            None => info!("No release tags found"),
        }

        version::resolve(
            latest.as_ref(),
            parameters.requested_release.as_ref(),
            parameters.production,
        )
    }

    /// Builds the registry of environments a run with these parameters targets
    pub fn registry_for(&self, parameters: &BuildParameters) -> Result<EnvironmentRegistry> {
        let registry = if parameters.production {
            EnvironmentRegistry::new(&self.config.config_dir, &parameters.environments)?
        } else {
            EnvironmentRegistry::new(
                &self.config.config_dir,
                [&self.config.development_environment],
            )?
        };
        Ok(registry)
    }

    async fn drive(&self, run: &mut PipelineRun, branch: Option<String>) -> Result<()> {
        let prepared = self.prepare(run, branch).await?;
        let on_primary = prepared.branch == self.config.primary_branch;

        if !run.parameters.production {
            run.enter(Stage::BuildAndTest);
            self.build_and_test(&run.parameters, &prepared.release).await?;

            if !on_primary {
                info!(
                    "Branch '{}' is not '{}'; skipping tag and development deploy",
                    prepared.branch, self.config.primary_branch
                );
                return Ok(());
            }

            run.enter(Stage::TagAndPushRepo);
            self.tag_and_push(&run.parameters, &prepared.release).await?;

            run.enter(Stage::DeployDevelopment);
            let environments = [self.config.development_environment.clone()];
            self.roll_out(run, &prepared, &environments).await
        } else if on_primary {
            run.enter(Stage::DeployProduction);
            let environments = run.parameters.environments.clone();
            if environments.is_empty() {
                warn!("Production run requested without environments; nothing to deploy");
            }
            self.roll_out(run, &prepared, &environments).await
        } else {
            info!(
                "Production deploys only run from '{}'; branch '{}' deploys nothing",
                self.config.primary_branch, prepared.branch
            );
            Ok(())
        }
    }

    async fn prepare(&self, run: &mut PipelineRun, branch: Option<String>) -> Result<Prepared> {
        let branch = match branch {
            Some(branch) => branch,
            None => self
                .source
                .current_branch()
                .await
                .map_err(|e| PipelineError::tool_failure("branch detection", e.to_string()))?,
        };
        run.branch = Some(branch.clone());

        let release = self.resolve_release(&run.parameters).await?;
        info!("Resolved release {} on branch '{}'", release, branch);
        run.release = Some(release.clone());
        self.write_version_file(&release)?;

        let extra_args = shell_words::split(&run.parameters.extra_args).map_err(|e| {
            PipelineError::InvalidParameters(format!("extra deploy arguments: {}", e))
        })?;

        let registry = self.registry_for(&run.parameters)?;

        Ok(Prepared {
            branch,
            release,
            registry,
            extra_args,
        })
    }

    fn write_version_file(&self, release: &ReleaseIdentifier) -> Result<()> {
        let path = self.config.version_file();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, format!("{}\n", release))?;
        Ok(())
    }

    async fn build_and_test(
        &self,
        parameters: &BuildParameters,
        release: &ReleaseIdentifier,
    ) -> Result<()> {
        info!("Running tests");
        check("tests", self.builder.run_tests().await)?;

        let secret = self.optional_secret(&parameters.credentials.cloud, "image push")?;
        let mut slot = CredentialSlot::new(self.config.cloud_credential_path());
        let context = match secret.as_deref() {
            Some(secret) => Some(slot.acquire(secret)?),
            None => None,
        };

        let pushed = self
            .builder
            .build_and_push_image(
                &self.config.image_repository,
                release,
                context.as_ref().map(|c| c.path()),
            )
            .await;
        drop(context);

        check("image build and push", pushed)
    }

    async fn tag_and_push(
        &self,
        parameters: &BuildParameters,
        release: &ReleaseIdentifier,
    ) -> Result<()> {
        info!("Tagging release {}", release);

        let secret = self.optional_secret(&parameters.credentials.source_control, "tag push")?;
        let mut slot = CredentialSlot::new(self.config.source_control_credential_path());
        let context = match secret.as_deref() {
            Some(secret) => Some(slot.acquire(secret)?),
            None => None,
        };

        let pushed = self
            .source
            .create_and_push_tag(release, context.as_ref().map(|c| c.path()))
            .await;
        drop(context);

        check("tag push", pushed)
    }

    /// Deploys to each environment in order, stopping at the first failure
    async fn roll_out(
        &self,
        run: &mut PipelineRun,
        prepared: &Prepared,
        environments: &[String],
    ) -> Result<()> {
        let mut executor = DeploymentExecutor::new(
            prepared.registry.clone(),
            Arc::clone(&self.deployer),
            Arc::clone(&self.secrets),
            &self.config,
        );

        for (idx, environment) in environments.iter().enumerate() {
            info!(
                "Deploying environment {}/{}: {}",
                idx + 1,
                environments.len(),
                environment
            );

            let outcome = executor
                .deploy(environment, &prepared.release, &prepared.extra_args)
                .await;
            let failure = match &outcome {
                DeploymentOutcome::Failed { reason, .. } => Some(reason.clone()),
                _ => None,
            };
            run.record(outcome);

            if let Some(reason) = failure {
                return Err(PipelineError::tool_failure(
                    format!("deploy to '{}'", environment),
                    reason,
                ));
            }
        }

        Ok(())
    }

    /// Fetches a credential that the next step can run without
    fn optional_secret(&self, name: &str, purpose: &str) -> Result<Option<String>> {
        let secret = self.secrets.secret(name)?;
        if secret.is_none() {
            warn!(
                "Credential '{}' not found; running {} without it",
                name, purpose
            );
        }
        Ok(secret)
    }
}

/// Turns a tool invocation into a step result
fn check(step: &str, result: std::io::Result<ToolOutput>) -> Result<()> {
    let output = result.map_err(|e| PipelineError::tool_failure(step, e.to_string()))?;
    if !output.success() {
        return Err(PipelineError::tool_failure(step, output.failure_reason()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::InMemorySecretStore;
    use crate::testing::FakeTools;
    use std::time::Duration;
    use tempfile::TempDir;
    use tugboat_core::domain::run::RunStatus;

    struct Fixture {
        _dir: TempDir,
        config: Config,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let config = Config {
                config_dir: dir.path().join("deploy"),
                state_dir: dir.path().join("state"),
                image_repository: "registry/app".to_string(),
                status_grace_period: Duration::ZERO,
                run_timeout: Duration::from_secs(10),
                ..Config::default()
            };
            std::fs::create_dir_all(&config.config_dir).unwrap();
            Self { _dir: dir, config }
        }

        fn configure(&self, environments: &[&str]) {
            for environment in environments {
                std::fs::write(
                    self.config
                        .config_dir
                        .join(format!("values-{}.yaml", environment)),
                    "replicas: 1\n",
                )
                .unwrap();
            }
        }

        fn controller(&self, tools: Arc<FakeTools>) -> PipelineController {
            let secrets = ["a", "b", "c", "development"]
                .iter()
                .fold(InMemorySecretStore::new(), |store, name| {
                    store.with_secret(format!("kubeconfig-{}", name), format!("cluster {}", name))
                });

            PipelineController::new(
                self.config.clone(),
                tools.clone(),
                tools.clone(),
                tools,
                Arc::new(secrets),
            )
        }
    }

    fn production(environments: &str) -> BuildParameters {
        BuildParameters {
            production: true,
            environments: BuildParameters::parse_environments(environments),
            ..BuildParameters::default()
        }
    }

    fn deployed(environment: &str) -> DeploymentOutcome {
        DeploymentOutcome::Deployed {
            environment: environment.to_string(),
        }
    }

    fn skipped(environment: &str) -> DeploymentOutcome {
        DeploymentOutcome::SkippedMissingConfig {
            environment: environment.to_string(),
        }
    }

    fn aborted_stage(run: &PipelineRun) -> Option<Stage> {
        match &run.status {
            RunStatus::Aborted { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_production_skips_unconfigured_environments() {
        let fixture = Fixture::new();
        fixture.configure(&["b"]);
        let tools = Arc::new(FakeTools::new().with_tags(&["v1.2.3"]));

        let run = fixture
            .controller(tools.clone())
            .run(production("a b c"), Some("main".to_string()))
            .await;

        assert_eq!(run.status, RunStatus::Done);
        assert_eq!(run.outcomes, vec![skipped("a"), deployed("b"), skipped("c")]);
        assert_eq!(run.skipped(), vec!["a", "c"]);
        assert_eq!(
            tools.calls(),
            vec!["list_tags", "deploy b v1.2.3", "status b"]
        );
    }

    #[tokio::test]
    async fn test_production_stops_at_first_failure() {
        let fixture = Fixture::new();
        fixture.configure(&["a", "b", "c"]);
        let tools = Arc::new(FakeTools::new().with_tags(&["v1.2.3"]).failing_deploy("b"));

        let run = fixture
            .controller(tools.clone())
            .run(production("a b c"), Some("main".to_string()))
            .await;

        assert!(run.is_aborted());
        assert_eq!(aborted_stage(&run), Some(Stage::DeployProduction));
        assert_eq!(run.outcomes.len(), 2);
        assert_eq!(run.outcomes[0], deployed("a"));
        assert!(run.outcomes[1].is_failure());
        assert_eq!(run.outcomes[1].environment(), "b");
        assert!(tools.calls_to("deploy c").is_empty());
        assert!(!fixture.config.cluster_credential_path().exists());
    }

    #[tokio::test]
    async fn test_production_without_release_aborts_before_deploying() {
        let fixture = Fixture::new();
        fixture.configure(&["a"]);
        let tools = Arc::new(FakeTools::new());

        let run = fixture
            .controller(tools.clone())
            .run(production("a"), Some("main".to_string()))
            .await;

        assert_eq!(aborted_stage(&run), Some(Stage::Prepare));
        match &run.status {
            RunStatus::Aborted { reason, .. } => assert!(reason.contains("no release available")),
            other => panic!("unexpected status {:?}", other),
        }
        assert!(tools.calls_to("deploy").is_empty());
        assert!(run.outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_production_deploys_requested_release() {
        let fixture = Fixture::new();
        fixture.configure(&["a"]);
        let tools = Arc::new(FakeTools::new().with_tags(&["v2.0.0"]));
        let parameters = BuildParameters {
            requested_release: Some("v1.9.4".parse().unwrap()),
            ..production("a")
        };

        let run = fixture
            .controller(tools.clone())
            .run(parameters, Some("main".to_string()))
            .await;

        assert_eq!(run.status, RunStatus::Done);
        assert_eq!(run.release, Some("v1.9.4".parse().unwrap()));
        assert_eq!(tools.calls_to("deploy"), vec!["deploy a v1.9.4"]);
    }

    #[tokio::test]
    async fn test_production_off_primary_branch_is_a_no_op() {
        let fixture = Fixture::new();
        fixture.configure(&["a"]);
        let tools = Arc::new(FakeTools::new().with_tags(&["v1.0.0"]));

        let run = fixture
            .controller(tools.clone())
            .run(production("a"), Some("feature/login".to_string()))
            .await;

        assert_eq!(run.status, RunStatus::Done);
        assert!(run.outcomes.is_empty());
        assert_eq!(tools.calls(), vec!["list_tags"]);
    }

    #[tokio::test]
    async fn test_primary_branch_builds_tags_and_deploys_development() {
        let fixture = Fixture::new();
        fixture.configure(&["development"]);
        let tools = Arc::new(FakeTools::new().with_tags(&["v1.0.0", "v0.9.9"]));

        let run = fixture
            .controller(tools.clone())
            .run(BuildParameters::default(), None)
            .await;

        assert_eq!(run.status, RunStatus::Done);
        assert_eq!(run.branch.as_deref(), Some("main"));
        assert_eq!(run.outcomes, vec![deployed("development")]);
        assert_eq!(
            tools.calls(),
            vec![
                "current_branch",
                "list_tags",
                "run_tests",
                "build_and_push_image registry/app:v1.0.1",
                "create_and_push_tag v1.0.1",
                "deploy development v1.0.1",
                "status development",
            ]
        );
        assert_eq!(
            std::fs::read_to_string(fixture.config.version_file()).unwrap(),
            "v1.0.1\n"
        );
    }

    #[tokio::test]
    async fn test_other_branches_never_tag() {
        let fixture = Fixture::new();
        fixture.configure(&["development"]);
        let tools = Arc::new(FakeTools::new());

        let run = fixture
            .controller(tools.clone())
            .run(BuildParameters::default(), Some("feature/login".to_string()))
            .await;

        assert_eq!(run.status, RunStatus::Done);
        assert_eq!(
            tools.calls(),
            vec![
                "list_tags",
                "run_tests",
                "build_and_push_image registry/app:v0.0.1",
            ]
        );
        assert!(run.outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_failed_tests_prevent_tagging() {
        let fixture = Fixture::new();
        fixture.configure(&["development"]);
        let mut fake = FakeTools::new();
        fake.fail_tests = true;
        let tools = Arc::new(fake);

        let run = fixture
            .controller(tools.clone())
            .run(BuildParameters::default(), Some("main".to_string()))
            .await;

        assert_eq!(aborted_stage(&run), Some(Stage::BuildAndTest));
        assert!(tools.calls_to("build_and_push_image").is_empty());
        assert!(tools.calls_to("create_and_push_tag").is_empty());
        assert!(tools.calls_to("deploy").is_empty());
    }

    #[tokio::test]
    async fn test_failed_image_push_prevents_tagging() {
        let fixture = Fixture::new();
        fixture.configure(&["development"]);
        let mut fake = FakeTools::new().with_tags(&["v1.0.0"]);
        fake.fail_image = true;
        let tools = Arc::new(fake);

        let run = fixture
            .controller(tools.clone())
            .run(BuildParameters::default(), Some("main".to_string()))
            .await;

        assert_eq!(aborted_stage(&run), Some(Stage::BuildAndTest));
        assert_eq!(
            tools.calls(),
            vec![
                "list_tags",
                "run_tests",
                "build_and_push_image registry/app:v1.0.1",
            ]
        );
        assert!(run.outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_failed_tag_push_prevents_development_deploy() {
        let fixture = Fixture::new();
        fixture.configure(&["development"]);
        let mut fake = FakeTools::new().with_tags(&["v1.0.0"]);
        fake.fail_tag = true;
        let tools = Arc::new(fake);

        let run = fixture
            .controller(tools.clone())
            .run(BuildParameters::default(), Some("main".to_string()))
            .await;

        assert_eq!(aborted_stage(&run), Some(Stage::TagAndPushRepo));
        match &run.status {
            RunStatus::Aborted { reason, .. } => assert!(reason.contains("tag push failed")),
            other => panic!("unexpected status {:?}", other),
        }
        assert_eq!(tools.calls_to("create_and_push_tag"), vec!["create_and_push_tag v1.0.1"]);
        assert!(tools.calls_to("deploy").is_empty());
        assert!(tools.calls_to("status").is_empty());
        assert!(run.outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_development_deploy_failure_is_fatal() {
        let fixture = Fixture::new();
        fixture.configure(&["development"]);
        let tools = Arc::new(FakeTools::new().failing_status("development"));

        let run = fixture
            .controller(tools.clone())
            .run(BuildParameters::default(), Some("main".to_string()))
            .await;

        assert_eq!(aborted_stage(&run), Some(Stage::DeployDevelopment));
        assert!(run.outcomes[0].is_failure());
    }

    #[tokio::test]
    async fn test_timeout_aborts_and_erases_credential() {
        let mut fixture = Fixture::new();
        fixture.config.run_timeout = Duration::from_millis(100);
        fixture.configure(&["a"]);
        let mut fake = FakeTools::new().with_tags(&["v1.0.0"]);
        fake.deploy_delay = Duration::from_secs(30);
        let tools = Arc::new(fake);

        let run = fixture
            .controller(tools.clone())
            .run(production("a"), Some("main".to_string()))
            .await;

        assert_eq!(aborted_stage(&run), Some(Stage::DeployProduction));
        match &run.status {
            RunStatus::Aborted { reason, .. } => assert!(reason.contains("timed out")),
            other => panic!("unexpected status {:?}", other),
        }
        assert_eq!(
            tools.access_seen(),
            vec![("a".to_string(), Some("cluster a".to_string()))]
        );
        assert!(!fixture.config.cluster_credential_path().exists());
    }

    #[tokio::test]
    async fn test_malformed_parameters_abort_in_prepare() {
        let fixture = Fixture::new();
        fixture.configure(&["a"]);
        let tools = Arc::new(FakeTools::new().with_tags(&["v1.0.0"]));
        let controller = fixture.controller(tools.clone());

        let unbalanced = BuildParameters {
            extra_args: "--set 'name=x".to_string(),
            ..production("a")
        };
        let run = controller.run(unbalanced, Some("main".to_string())).await;
        assert_eq!(aborted_stage(&run), Some(Stage::Prepare));

        let duplicated = production("a a");
        let run = controller.run(duplicated, Some("main".to_string())).await;
        assert_eq!(aborted_stage(&run), Some(Stage::Prepare));

        assert!(tools.calls_to("deploy").is_empty());
    }

    #[tokio::test]
    async fn test_resolve_release_has_no_side_effects() {
        let fixture = Fixture::new();
        let tools = Arc::new(FakeTools::new().with_tags(&["v0.3.7", "nightly"]));
        let controller = fixture.controller(tools.clone());

        let release = controller
            .resolve_release(&BuildParameters::default())
            .await
            .unwrap();

        assert_eq!(release.to_string(), "v0.3.8");
        assert_eq!(tools.calls(), vec!["list_tags"]);
        assert!(!fixture.config.version_file().exists());
    }
}
