//! Environment registry
//!
//! Maps environment names to their configuration file and cluster credential.
//! Naming conventions are applied once, when an environment is registered, so
//! lookups during a run never derive anything ad hoc.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use tugboat_core::domain::environment::{CredentialHandle, Environment, EnvironmentBinding};

/// Errors raised while building a registry
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid environment name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("environment '{0}' is listed more than once")]
    DuplicateEnvironment(String),
}

/// Read-only registry of deployable environments
#[derive(Debug, Clone)]
pub struct EnvironmentRegistry {
    config_dir: PathBuf,
    /// Registered environments in registration order
    environments: Vec<Environment>,
}

impl EnvironmentRegistry {
    /// Builds a registry for the given environment names
    ///
    /// # Arguments
    /// * `config_dir` - Directory holding the per-environment configuration files
    /// * `names` - Environment names, in rollout order
    ///
    /// # Errors
    /// Fails when a name is malformed or appears twice.
    pub fn new<I, S>(config_dir: impl Into<PathBuf>, names: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let config_dir = config_dir.into();
        let mut seen = HashSet::new();
        let mut environments = Vec::new();

        for name in names {
            let name = name.as_ref();
            validate_name(name)?;

            if !seen.insert(name.to_string()) {
                return Err(RegistryError::DuplicateEnvironment(name.to_string()));
            }

            environments.push(Environment {
                name: name.to_string(),
                config_path: config_path_for(&config_dir, name),
                credential: credential_for(name),
            });
        }

        Ok(Self {
            config_dir,
            environments,
        })
    }

    /// Looks up what is currently known about an environment
    ///
    /// Never fails: a missing configuration file, or a name that was never
    /// registered, is reported as `config_present = false`.
    pub fn resolve(&self, name: &str) -> EnvironmentBinding {
        let Some(environment) = self.get(name) else {
            debug!("Environment '{}' is not registered", name);
            return EnvironmentBinding::unknown();
        };

        let config_present = environment.config_path.is_file();
        debug!(
            "Environment '{}': config {} ({})",
            name,
            if config_present { "present" } else { "absent" },
            environment.config_path.display()
        );

        EnvironmentBinding {
            config_present,
            credential: Some(environment.credential.clone()),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Environment> {
        self.environments.iter().find(|e| e.name == name)
    }

    /// Registered environments in registration order
    pub fn environments(&self) -> &[Environment] {
        &self.environments
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}

/// Checks that a name can safely be used in file and secret names
pub fn validate_name(name: &str) -> Result<(), RegistryError> {
    let invalid = |reason| {
        Err(RegistryError::InvalidName {
            name: name.to_string(),
            reason,
        })
    };

    let Some(first) = name.chars().next() else {
        return invalid("name is empty");
    };

    if !first.is_ascii_lowercase() && !first.is_ascii_digit() {
        return invalid("must start with a lowercase letter or digit");
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return invalid("only lowercase letters, digits, '-' and '_' are allowed");
    }

    Ok(())
}

/// Configuration file convention: `<config_dir>/values-<name>.yaml`
pub fn config_path_for(config_dir: &Path, name: &str) -> PathBuf {
    config_dir.join(format!("values-{}.yaml", name))
}

/// Credential convention: `kubeconfig-<name>`
pub fn credential_for(name: &str) -> CredentialHandle {
    CredentialHandle::new(format!("kubeconfig-{}", name))
}
