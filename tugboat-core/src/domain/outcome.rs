//! Deployment outcome domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of deploying a release to one environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeploymentOutcome {
    /// Deploy and status verification both succeeded
    Deployed { environment: String },

    /// The environment has no configuration file; nothing was invoked
    SkippedMissingConfig { environment: String },

    /// Deploy, status verification or credential setup failed
    Failed { environment: String, reason: String },
}

impl DeploymentOutcome {
    pub fn environment(&self) -> &str {
        match self {
            DeploymentOutcome::Deployed { environment }
            | DeploymentOutcome::SkippedMissingConfig { environment }
            | DeploymentOutcome::Failed { environment, .. } => environment,
        }
    }

    /// Whether this outcome must abort the run
    pub fn is_failure(&self) -> bool {
        matches!(self, DeploymentOutcome::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, DeploymentOutcome::SkippedMissingConfig { .. })
    }
}

impl fmt::Display for DeploymentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentOutcome::Deployed { environment } => write!(f, "{}: deployed", environment),
            DeploymentOutcome::SkippedMissingConfig { environment } => {
                write!(f, "{}: skipped (no configuration)", environment)
            }
            DeploymentOutcome::Failed {
                environment,
                reason,
            } => write!(f, "{}: failed ({})", environment, reason),
        }
    }
}
