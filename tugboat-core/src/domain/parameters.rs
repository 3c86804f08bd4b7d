//! Build parameter domain types

use serde::{Deserialize, Serialize};

use super::release::ReleaseIdentifier;

/// Immutable input bundle for one pipeline run
///
/// Constructed once from the command line (or its environment fallbacks) and
/// passed by reference through every stage of the run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildParameters {
    /// Deploy a previously built release instead of building a new one
    pub production: bool,

    /// Explicit release to build or deploy; `None` resolves automatically
    pub requested_release: Option<ReleaseIdentifier>,

    /// Target environments for a production rollout, in rollout order
    pub environments: Vec<String>,

    /// Extra arguments handed to the deploy tool untouched
    pub extra_args: String,

    /// Names of the secrets used to authenticate to external systems
    pub credentials: CredentialRefs,
}

/// Secret names (never values) used during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRefs {
    /// Secret used to push tags to source control
    pub source_control: String,

    /// Secret used to authenticate to the cloud provider's image registry
    pub cloud: String,
}

impl BuildParameters {
    /// Splits a space-separated environment list, preserving order
    pub fn parse_environments(list: &str) -> Vec<String> {
        list.split_whitespace().map(str::to_string).collect()
    }
}

impl Default for CredentialRefs {
    fn default() -> Self {
        Self {
            source_control: "git-credentials".to_string(),
            cloud: "cloud-credentials".to_string(),
        }
    }
}
