//! Execution errors.

use gatehouse_core::CheckId;

/// Error type for execution.
pub type Result<T> = std::result::Result<T, ExecutionError>;

/// Internal faults that abort a whole run.
///
/// Gate outcomes, including checks that crash, are reported as results;
/// these errors mean the run itself could not be scheduled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    /// Checks depend on each other in a cycle
    #[error("dependency cycle between checks: {}", join(.checks))]
    DependencyCycle {
        /// Checks that can never become ready
        checks: Vec<CheckId>,
    },

    /// Scheduling made no progress with checks still pending
    #[error("scheduling stalled with pending checks: {}", join(.checks))]
    Stalled {
        /// Checks left pending
        checks: Vec<CheckId>,
    },

    /// A worker task was lost before reporting a result
    #[error("worker task lost: {0}")]
    WorkerLost(String),
}

fn join(checks: &[CheckId]) -> String {
    checks
        .iter()
        .map(CheckId::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
