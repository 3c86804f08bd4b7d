//! Credential handling
//!
//! Secrets are looked up by name in a [`SecretStore`] and only ever touch the
//! disk through a [`CredentialSlot`], which erases the materialized file when
//! the returned [`CredentialContext`] goes out of scope.

mod context;
mod store;

pub use context::{CredentialContext, CredentialSlot};
pub use store::{DirectorySecretStore, InMemorySecretStore, SecretStore};
