//! Error types for pipeline runs

use std::time::Duration;
use thiserror::Error;
use tugboat_core::domain::release::{ParseReleaseError, ReleaseIdentifier};

use crate::service::registry::RegistryError;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Conditions that abort a pipeline run
///
/// Environments skipped for missing configuration are not errors; they are
/// recorded as outcomes on the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Production deploy requested without a release to deploy
    #[error("no release available: none was requested and no release tag exists")]
    NoReleaseAvailable,

    /// The latest release has no patch successor
    #[error("cannot mint a release after {0}: patch component is exhausted")]
    ReleaseExhausted(ReleaseIdentifier),

    /// A release identifier could not be parsed
    #[error(transparent)]
    InvalidRelease(#[from] ParseReleaseError),

    /// Run parameters are malformed
    #[error("invalid run parameters: {0}")]
    InvalidParameters(String),

    /// The environment registry could not be built
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// An external build, test, tag, deploy or status command failed
    #[error("{step} failed: {reason}")]
    ExternalToolFailure { step: String, reason: String },

    /// The run exceeded its wall-clock limit
    #[error("run timed out after {0:?}")]
    Timeout(Duration),

    /// Local filesystem error (version file, credential files, secrets)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Create an external tool failure for a named step
    pub fn tool_failure(step: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ExternalToolFailure {
            step: step.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error came from the wall-clock limit
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
