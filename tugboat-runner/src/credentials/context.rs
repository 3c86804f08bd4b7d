//! Scoped credential contexts
//!
//! A credential slot is one fixed file path that a secret is materialized to
//! for the duration of a single external invocation. Acquiring a slot needs
//! exclusive access to it, so a slot can hold at most one live context; this
//! is what keeps per-environment deployments sequential.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Reusable location for one materialized secret
#[derive(Debug)]
pub struct CredentialSlot {
    path: PathBuf,
}

impl CredentialSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the secret to the slot's file
    ///
    /// The file is owner-readable only and is removed when the returned
    /// context is dropped, whichever way the caller exits.
    pub fn acquire(&mut self, secret: &str) -> io::Result<CredentialContext<'_>> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let context = CredentialContext { path: &self.path };
        // A failed write drops `context`, which removes any partial file.
        write_private(&self.path, secret)?;

        debug!("Materialized credential at {}", self.path.display());
        Ok(context)
    }
}

/// Live materialization of a secret; erased on drop
#[derive(Debug)]
pub struct CredentialContext<'a> {
    path: &'a Path,
}

impl CredentialContext<'_> {
    pub fn path(&self) -> &Path {
        self.path
    }
}

impl Drop for CredentialContext<'_> {
    fn drop(&mut self) {
        match fs::remove_file(self.path) {
            Ok(()) => debug!("Erased credential at {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to erase credential at {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

fn write_private(path: &Path, secret: &str) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(secret.as_bytes())?;
    file.sync_all()
}
