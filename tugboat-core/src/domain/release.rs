//! Release identifier domain type

use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A release identifier of the form `vMAJOR.MINOR.PATCH`
///
/// Release identifiers double as git tag names and container image tags.
/// Pre-release and build metadata are not part of the format and are rejected
/// when parsing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReleaseIdentifier(Version);

/// Errors produced when a string is not a valid release identifier
#[derive(Debug, Error)]
pub enum ParseReleaseError {
    #[error("release identifier '{0}' must start with 'v'")]
    MissingPrefix(String),

    #[error("release identifier '{input}' is not MAJOR.MINOR.PATCH: {source}")]
    InvalidVersion {
        input: String,
        #[source]
        source: semver::Error,
    },

    #[error("release identifier '{0}' must not carry pre-release or build metadata")]
    UnexpectedMetadata(String),
}

impl ReleaseIdentifier {
    /// Creates a release identifier from its components
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(Version::new(major, minor, patch))
    }

    /// The identifier minted when a repository has no release yet (`v0.0.1`)
    pub fn initial() -> Self {
        Self::new(0, 0, 1)
    }

    pub fn major(&self) -> u64 {
        self.0.major
    }

    pub fn minor(&self) -> u64 {
        self.0.minor
    }

    pub fn patch(&self) -> u64 {
        self.0.patch
    }

    /// Returns the identifier with the patch component incremented
    ///
    /// Major and minor components are held fixed. Returns `None` when the
    /// patch component is already `u64::MAX`.
    pub fn next_patch(&self) -> Option<Self> {
        let patch = self.0.patch.checked_add(1)?;
        Some(Self::new(self.0.major, self.0.minor, patch))
    }

    /// Picks the greatest release identifier among a set of tag names
    ///
    /// Tags that are not release identifiers (e.g. `latest`, `v1.0.0-rc.1`)
    /// are ignored. Returns `None` when no tag qualifies.
    pub fn latest<I, S>(tags: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tags.into_iter()
            .filter_map(|tag| tag.as_ref().trim().parse::<Self>().ok())
            .max()
    }
}

impl FromStr for ReleaseIdentifier {
    type Err = ParseReleaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix('v')
            .ok_or_else(|| ParseReleaseError::MissingPrefix(s.to_string()))?;

        let version = Version::parse(digits).map_err(|source| ParseReleaseError::InvalidVersion {
            input: s.to_string(),
            source,
        })?;

        if !version.pre.is_empty() || !version.build.is_empty() {
            return Err(ParseReleaseError::UnexpectedMetadata(s.to_string()));
        }

        Ok(Self(version))
    }
}

impl TryFrom<String> for ReleaseIdentifier {
    type Error = ParseReleaseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ReleaseIdentifier> for String {
    fn from(release: ReleaseIdentifier) -> Self {
        release.to_string()
    }
}

impl fmt::Display for ReleaseIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}
