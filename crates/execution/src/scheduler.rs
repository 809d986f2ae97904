//! Worker slot accounting.

use std::num::NonZeroUsize;

/// Default number of checks allowed to run at once.
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Budget for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    /// Max concurrent checks
    pub max_concurrent: NonZeroUsize,
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            max_concurrent: NonZeroUsize::new(DEFAULT_MAX_CONCURRENT).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

impl Budget {
    /// Create a new budget.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set max concurrent checks.
    pub fn with_max_concurrent(mut self, max: NonZeroUsize) -> Self {
        self.max_concurrent = max;
        self
    }
}

/// Tracks how many worker slots are in use during one run.
#[derive(Debug)]
pub struct ResourceScheduler {
    budget: Budget,
    active_checks: usize,
    peak_checks: usize,
}

impl ResourceScheduler {
    /// Create a new scheduler.
    pub fn new(budget: Budget) -> Self {
        Self {
            budget,
            active_checks: 0,
            peak_checks: 0,
        }
    }

    /// Check if we can start a new check.
    pub fn can_start(&self) -> bool {
        self.active_checks < self.budget.max_concurrent.get()
    }

    /// Register a check start.
    pub fn check_started(&mut self) {
        self.active_checks += 1;
        self.peak_checks = self.peak_checks.max(self.active_checks);
    }

    /// Register a check completion.
    pub fn check_completed(&mut self) {
        self.active_checks = self.active_checks.saturating_sub(1);
    }

    /// Highest number of simultaneously running checks seen.
    pub fn peak(&self) -> usize {
        self.peak_checks
    }
}

impl Default for ResourceScheduler {
    fn default() -> Self {
        Self::new(Budget::default())
    }
}
