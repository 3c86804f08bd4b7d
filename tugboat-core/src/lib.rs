//! Tugboat Core
//!
//! Core types for the Tugboat release and deployment orchestrator.
//!
//! This crate contains the domain types shared between the runner (which
//! resolves releases and drives deployments) and the CLI (which collects run
//! parameters and renders run summaries).

pub mod domain;
