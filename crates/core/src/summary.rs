//! Aggregated outcome of a run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::id::CheckId;
use crate::result::{CheckStatus, ExecutionResult, ScopeInfo};

/// Summary of a quality gate run.
///
/// Built once from a result list and never mutated; to recompute, build a
/// fresh summary from an updated list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    total_checks: usize,
    passed: usize,
    failed: usize,
    warned: usize,
    skipped: usize,
    not_applicable: usize,
    errors: usize,
    total_duration: Duration,
    results: Vec<ExecutionResult>,
}

impl ExecutionSummary {
    /// Tally a result list. Input order is preserved.
    pub fn from_results(results: Vec<ExecutionResult>, total_duration: Duration) -> Self {
        let count = |status: CheckStatus| results.iter().filter(|r| r.status == status).count();

        Self {
            total_checks: results.len(),
            passed: count(CheckStatus::Passed),
            failed: count(CheckStatus::Failed),
            warned: count(CheckStatus::Warned),
            skipped: count(CheckStatus::Skipped),
            not_applicable: count(CheckStatus::NotApplicable),
            errors: count(CheckStatus::Error),
            total_duration,
            results,
        }
    }

    /// An empty summary.
    pub fn empty(total_duration: Duration) -> Self {
        Self::from_results(Vec::new(), total_duration)
    }

    /// True when nothing failed and nothing errored.
    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.errors == 0
    }

    /// Number of results.
    pub fn total_checks(&self) -> usize {
        self.total_checks
    }

    /// Passed count.
    pub fn passed(&self) -> usize {
        self.passed
    }

    /// Failed count.
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Warned count.
    pub fn warned(&self) -> usize {
        self.warned
    }

    /// Skipped count.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// NotApplicable count.
    pub fn not_applicable(&self) -> usize {
        self.not_applicable
    }

    /// Error count.
    pub fn errors(&self) -> usize {
        self.errors
    }

    /// Count for an arbitrary status.
    pub fn count(&self, status: CheckStatus) -> usize {
        match status {
            CheckStatus::Passed => self.passed,
            CheckStatus::Failed => self.failed,
            CheckStatus::Warned => self.warned,
            CheckStatus::Skipped => self.skipped,
            CheckStatus::NotApplicable => self.not_applicable,
            CheckStatus::Error => self.errors,
        }
    }

    /// Wall-clock time of the whole run.
    pub fn total_duration(&self) -> Duration {
        self.total_duration
    }

    /// Results in order.
    pub fn results(&self) -> &[ExecutionResult] {
        &self.results
    }

    /// Result for a given check.
    pub fn result(&self, id: &CheckId) -> Option<&ExecutionResult> {
        self.results.iter().find(|r| &r.check == id)
    }

    /// Results that block the verdict.
    pub fn failures(&self) -> impl Iterator<Item = &ExecutionResult> {
        self.results.iter().filter(|r| r.status.is_blocking())
    }

    /// Scope per category, taking the max since checks in one category
    /// usually scan overlapping files.
    pub fn scope_by_category(&self) -> BTreeMap<String, ScopeInfo> {
        let mut by_category: BTreeMap<String, ScopeInfo> = BTreeMap::new();
        for result in &self.results {
            let Some(scope) = result.scope else { continue };
            by_category
                .entry(result.check.category().to_string())
                .and_modify(|existing| *existing = existing.max(scope))
                .or_insert(scope);
        }
        by_category
    }

    /// Overall scope across categories, or `None` if nothing reported scope.
    pub fn total_scope(&self) -> Option<ScopeInfo> {
        self.scope_by_category().into_values().reduce(ScopeInfo::max)
    }
}
