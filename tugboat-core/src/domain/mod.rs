//! Core domain types
//!
//! These types describe a single pipeline run: the parameters it was started
//! with, the release it resolved, the environments it targets and the outcome
//! of every deployment attempt.

pub mod environment;
pub mod outcome;
pub mod parameters;
pub mod release;
pub mod run;
