//! Pipeline run domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::outcome::DeploymentOutcome;
use super::parameters::BuildParameters;
use super::release::ReleaseIdentifier;

/// Transient record of one pipeline run
///
/// Created when the run starts and discarded when it ends. It only outlives
/// the run as log output and as the summary printed by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: Uuid,
    pub parameters: BuildParameters,
    pub branch: Option<String>,
    pub release: Option<ReleaseIdentifier>,
    /// Last stage the run entered
    pub stage: Stage,
    pub status: RunStatus,
    /// Deployment outcomes in the order they were produced
    pub outcomes: Vec<DeploymentOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Prepare,
    BuildAndTest,
    TagAndPushRepo,
    DeployDevelopment,
    DeployProduction,
}

/// Terminal (or current) state of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Done,
    Aborted { stage: Stage, reason: String },
}

impl PipelineRun {
    /// Starts a new run in the `Prepare` stage
    pub fn new(parameters: BuildParameters) -> Self {
        Self {
            id: Uuid::new_v4(),
            parameters,
            branch: None,
            release: None,
            stage: Stage::Prepare,
            status: RunStatus::Running,
            outcomes: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn enter(&mut self, stage: Stage) {
        self.stage = stage;
    }

    pub fn record(&mut self, outcome: DeploymentOutcome) {
        self.outcomes.push(outcome);
    }

    /// Marks the run as completed successfully
    pub fn finish(&mut self) {
        self.status = RunStatus::Done;
        self.finished_at = Some(Utc::now());
    }

    /// Marks the run as aborted in its current stage
    pub fn abort(&mut self, reason: impl Into<String>) {
        self.status = RunStatus::Aborted {
            stage: self.stage,
            reason: reason.into(),
        };
        self.finished_at = Some(Utc::now());
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.status, RunStatus::Aborted { .. })
    }

    /// Environments skipped because their configuration was absent
    pub fn skipped(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.is_skipped())
            .map(DeploymentOutcome::environment)
            .collect()
    }

    /// Environments successfully deployed
    pub fn deployed(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, DeploymentOutcome::Deployed { .. }))
            .map(DeploymentOutcome::environment)
            .collect()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Prepare => write!(f, "Prepare"),
            Stage::BuildAndTest => write!(f, "BuildAndTest"),
            Stage::TagAndPushRepo => write!(f, "TagAndPushRepo"),
            Stage::DeployDevelopment => write!(f, "DeployDevelopment"),
            Stage::DeployProduction => write!(f, "DeployProduction"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_captures_current_stage() {
        let mut run = PipelineRun::new(BuildParameters::default());
        run.enter(Stage::DeployProduction);
        run.abort("deploy to eu-west failed");

        assert!(run.is_aborted());
        assert_eq!(
            run.status,
            RunStatus::Aborted {
                stage: Stage::DeployProduction,
                reason: "deploy to eu-west failed".to_string(),
            }
        );
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn test_skipped_and_deployed_views() {
        let mut run = PipelineRun::new(BuildParameters::default());
        run.record(DeploymentOutcome::SkippedMissingConfig {
            environment: "a".to_string(),
        });
        run.record(DeploymentOutcome::Deployed {
            environment: "b".to_string(),
        });
        run.record(DeploymentOutcome::SkippedMissingConfig {
            environment: "c".to_string(),
        });
        run.finish();

        assert_eq!(run.skipped(), vec!["a", "c"]);
        assert_eq!(run.deployed(), vec!["b"]);
        assert_eq!(run.status, RunStatus::Done);
    }

    #[test]
    fn test_status_serialization() {
        let status = RunStatus::Aborted {
            stage: Stage::Prepare,
            reason: "no release".to_string(),
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["status"], "aborted");
        assert_eq!(value["stage"], "prepare");
    }
}
