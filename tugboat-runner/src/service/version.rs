//! Release version resolution
//!
//! Turns the latest existing release tag, an optionally requested release and
//! the run mode into the release a run builds or deploys. Only the
//! non-production path ever mints a new identifier.

use tugboat_core::domain::release::ReleaseIdentifier;

use crate::error::{PipelineError, Result};

/// Resolves the release identifier for a run
///
/// # Arguments
/// * `latest` - Greatest release tag already present in source control
/// * `requested` - Release explicitly requested for this run
/// * `production` - Whether the run deploys an existing release
///
/// # Returns
/// The requested release when given. Otherwise, in production mode, the
/// latest existing release; outside production mode, the patch successor of
/// the latest release (or `v0.0.1` when there is none).
pub fn resolve(
    latest: Option<&ReleaseIdentifier>,
    requested: Option<&ReleaseIdentifier>,
    production: bool,
) -> Result<ReleaseIdentifier> {
    if let Some(requested) = requested {
        return Ok(requested.clone());
    }

    if production {
        return latest.cloned().ok_or(PipelineError::NoReleaseAvailable);
    }

    match latest {
        Some(latest) => latest
            .next_patch()
            .ok_or_else(|| PipelineError::ReleaseExhausted(latest.clone())),
        None => Ok(ReleaseIdentifier::initial()),
    }
}
