//! Deployment environment domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A named deployment target
///
/// The configuration path and credential are derived from the name once, when
/// the environment is registered, and never change during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    pub config_path: PathBuf,
    pub credential: CredentialHandle,
}

/// Name of the secret holding an environment's cluster access
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialHandle(String);

impl CredentialHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CredentialHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the registry knows about an environment at lookup time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentBinding {
    /// Whether the environment's configuration file exists
    pub config_present: bool,

    /// Credential to materialize before deploying, if one is registered
    pub credential: Option<CredentialHandle>,
}

impl EnvironmentBinding {
    /// Binding for a name the registry knows nothing about
    pub fn unknown() -> Self {
        Self {
            config_present: false,
            credential: None,
        }
    }
}
