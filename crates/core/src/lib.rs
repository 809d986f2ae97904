//! Gatehouse core data models.
//!
//! This crate defines the data structures shared by the check registry
//! and the executor: identities, per-check results, run summaries and
//! the configuration document.

#![warn(missing_docs)]

// Core identities
mod id;

// Outcomes
mod result;
mod summary;

// Configuration
mod config;

// Re-exports
pub use id::{CheckId, CheckIdError};
pub use result::{CheckDefinition, CheckStatus, ExecutionResult, ScopeInfo, SkipReason};
pub use summary::ExecutionSummary;
pub use config::{ConfigError, GateSettings, GateStatus, QualityConfig};
