//! # Automation Library
//!
//! Shared types and utilities for the robot task orchestrator.
//! Every component crate in the workspace depends on this library for the
//! data model, configuration and tracing setup.

pub mod types;
pub mod utils;

// Re-export everything for convenience
pub use types::*;
pub use utils::*;
