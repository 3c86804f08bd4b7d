//! Secret stores
//!
//! A secret store hands out opaque secret blobs by name. Values are never
//! logged.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use tracing::debug;

/// Source of secret values keyed by name
pub trait SecretStore: Send + Sync {
    /// Fetches a secret
    ///
    /// # Returns
    /// `Ok(None)` when no secret with that name exists
    fn secret(&self, name: &str) -> io::Result<Option<String>>;
}

/// Secrets stored one per file in a directory (e.g. mounted CI secrets)
#[derive(Debug, Clone)]
pub struct DirectorySecretStore {
    root: PathBuf,
}

impl DirectorySecretStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SecretStore for DirectorySecretStore {
    fn secret(&self, name: &str) -> io::Result<Option<String>> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid secret name '{}'", name),
            ));
        }

        let path = self.root.join(name);
        match std::fs::read_to_string(&path) {
            Ok(value) => {
                debug!("Loaded secret '{}' from {}", name, self.root.display());
                Ok(Some(value))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Secrets held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemorySecretStore {
    secrets: HashMap<String, String>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), value.into());
        self
    }
}

impl SecretStore for InMemorySecretStore {
    fn secret(&self, name: &str) -> io::Result<Option<String>> {
        Ok(self.secrets.get(name).cloned())
    }
}
