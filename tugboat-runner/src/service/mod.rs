//! Service layer
//!
//! Services contain the decision logic of a pipeline run: which release to
//! build or deploy, what is known about each environment, and how a single
//! environment is deployed and verified.

pub mod deployment;
pub mod registry;
pub mod version;

pub use deployment::DeploymentExecutor;
pub use registry::{EnvironmentRegistry, RegistryError};
