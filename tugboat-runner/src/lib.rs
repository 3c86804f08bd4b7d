//! Tugboat pipeline runner
//!
//! Resolves the release, builds and tests, tags the repository and deploys to
//! environments through external tools. See [`controller::PipelineController`].

pub mod config;
pub mod controller;
pub mod credentials;
pub mod error;
pub mod service;
pub mod tools;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use controller::PipelineController;
pub use error::PipelineError;
