//! Per-check outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::id::{CheckId, CheckIdError};

/// Status of a quality gate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    /// Gate evaluated and met
    Passed,
    /// Gate evaluated and not met
    Failed,
    /// Advisory finding, never blocks the verdict
    Warned,
    /// Deliberately not executed
    Skipped,
    /// Project shape does not match the check
    NotApplicable,
    /// Gate could not be evaluated
    Error,
}

impl CheckStatus {
    /// Every status, in reporting order.
    pub const ALL: [CheckStatus; 6] = [
        CheckStatus::Passed,
        CheckStatus::Failed,
        CheckStatus::Warned,
        CheckStatus::Skipped,
        CheckStatus::NotApplicable,
        CheckStatus::Error,
    ];

    /// Whether this status blocks an overall pass.
    pub fn is_blocking(self) -> bool {
        matches!(self, CheckStatus::Failed | CheckStatus::Error)
    }

    /// Lowercase label used in logs and output.
    pub fn as_str(self) -> &'static str {
        match self {
            CheckStatus::Passed => "passed",
            CheckStatus::Failed => "failed",
            CheckStatus::Warned => "warned",
            CheckStatus::Skipped => "skipped",
            CheckStatus::NotApplicable => "not_applicable",
            CheckStatus::Error => "error",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a check was not executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// The applicability predicate returned false
    NotApplicable,
    /// A dependency finished without passing
    DependencyFailed {
        /// First dependency found not passing
        dependency: CheckId,
    },
    /// Scheduling stopped after a failure in fail-fast mode
    FailFast,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotApplicable => f.write_str("not applicable"),
            SkipReason::DependencyFailed { dependency } => {
                write!(f, "dependency failed: {dependency}")
            }
            SkipReason::FailFast => f.write_str("stopped by fail-fast"),
        }
    }
}

/// Files and lines of code examined by a check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeInfo {
    /// Number of source files examined
    pub files: u64,
    /// Total lines across those files
    pub lines: u64,
}

impl ScopeInfo {
    /// Create a new scope.
    pub fn new(files: u64, lines: u64) -> Self {
        Self { files, lines }
    }

    /// Component-wise maximum, used when scans overlap.
    pub fn max(self, other: ScopeInfo) -> ScopeInfo {
        ScopeInfo {
            files: self.files.max(other.files),
            lines: self.lines.max(other.lines),
        }
    }

    /// Compact rendering such as `47 files · 3.2k LOC`.
    pub fn format_compact(&self) -> String {
        let mut parts = Vec::new();
        if self.files > 0 {
            parts.push(format!("{} files", self.files));
        }
        if self.lines > 0 {
            if self.lines >= 10_000 {
                parts.push(format!("{:.1}k LOC", self.lines as f64 / 1000.0));
            } else {
                parts.push(format!("{} LOC", group_thousands(self.lines)));
            }
        }
        parts.join(" · ")
    }
}

impl std::ops::Add for ScopeInfo {
    type Output = ScopeInfo;

    fn add(self, other: ScopeInfo) -> ScopeInfo {
        ScopeInfo {
            files: self.files + other.files,
            lines: self.lines + other.lines,
        }
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Result of executing one quality gate check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Check that produced this result
    pub check: CheckId,

    /// Outcome
    pub status: CheckStatus,

    /// Execution time
    pub duration: Duration,

    /// Captured tool output
    pub output: String,

    /// Error message for Failed or Error results
    pub error: Option<String>,

    /// Actionable suggestion for fixing a failure
    pub fix_suggestion: Option<String>,

    /// Whether remediation changed the project before evaluation
    pub auto_fixed: bool,

    /// Why the check did not run, for Skipped and NotApplicable results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,

    /// Files and lines examined
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ScopeInfo>,
}

impl ExecutionResult {
    /// Create a result with the given status and empty details.
    pub fn new(check: CheckId, status: CheckStatus, duration: Duration) -> Self {
        Self {
            check,
            status,
            duration,
            output: String::new(),
            error: None,
            fix_suggestion: None,
            auto_fixed: false,
            skip_reason: None,
            scope: None,
        }
    }

    /// A passing result.
    pub fn passed(check: CheckId, duration: Duration) -> Self {
        Self::new(check, CheckStatus::Passed, duration)
    }

    /// A failing result carrying the reason the gate was not met.
    pub fn failed(check: CheckId, duration: Duration, error: impl Into<String>) -> Self {
        Self::new(check, CheckStatus::Failed, duration).with_error(error)
    }

    /// An advisory result.
    pub fn warned(check: CheckId, duration: Duration) -> Self {
        Self::new(check, CheckStatus::Warned, duration)
    }

    /// A result for a check that could not be evaluated.
    pub fn errored(check: CheckId, duration: Duration, error: impl Into<String>) -> Self {
        Self::new(check, CheckStatus::Error, duration).with_error(error)
    }

    /// A zero-duration result for a check that was not executed.
    pub fn skipped(check: CheckId, reason: SkipReason) -> Self {
        let status = match reason {
            SkipReason::NotApplicable => CheckStatus::NotApplicable,
            _ => CheckStatus::Skipped,
        };
        let mut result = Self::new(check, status, Duration::ZERO);
        result.output = reason.to_string();
        result.skip_reason = Some(reason);
        result
    }

    /// Set the output text.
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    /// Set the error message.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Set the fix suggestion.
    pub fn with_fix_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.fix_suggestion = Some(suggestion.into());
        self
    }

    /// Attach scope metrics.
    pub fn with_scope(mut self, scope: ScopeInfo) -> Self {
        self.scope = Some(scope);
        self
    }

    /// True if the gate passed.
    pub fn is_passed(&self) -> bool {
        self.status == CheckStatus::Passed
    }

    /// True if the gate failed.
    pub fn is_failed(&self) -> bool {
        self.status == CheckStatus::Failed
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ({:.2}s)",
            self.check,
            self.status,
            self.duration.as_secs_f64()
        )
    }
}

/// Registered metadata for a check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckDefinition {
    /// Qualified id
    pub id: CheckId,

    /// Human-readable label
    pub display_name: String,

    /// Checks that must pass first
    pub depends_on: Vec<CheckId>,

    /// Whether the check offers remediation
    pub auto_fix: bool,
}

impl CheckDefinition {
    /// Create a definition with no dependencies and no auto-fix.
    pub fn new(id: CheckId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            depends_on: Vec::new(),
            auto_fix: false,
        }
    }

    /// Add a dependency given in qualified form.
    pub fn depends_on(mut self, dependency: &str) -> Result<Self, CheckIdError> {
        self.depends_on.push(dependency.parse()?);
        Ok(self)
    }

    /// Set the auto-fix flag.
    pub fn with_auto_fix(mut self, auto_fix: bool) -> Self {
        self.auto_fix = auto_fix;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> CheckId {
        CheckId::new("python", "tests")
    }

    #[test]
    fn test_blocking_statuses() {
        let blocking: Vec<_> = CheckStatus::ALL
            .iter()
            .copied()
            .filter(|s| s.is_blocking())
            .collect();
        assert_eq!(blocking, vec![CheckStatus::Failed, CheckStatus::Error]);
    }

    #[test]
    fn test_skipped_constructor() {
        let result = ExecutionResult::skipped(
            id(),
            SkipReason::DependencyFailed {
                dependency: CheckId::new("python", "lint"),
            },
        );
        assert_eq!(result.status, CheckStatus::Skipped);
        assert_eq!(result.duration, Duration::ZERO);
        assert_eq!(result.output, "dependency failed: python:lint");

        let na = ExecutionResult::skipped(id(), SkipReason::NotApplicable);
        assert_eq!(na.status, CheckStatus::NotApplicable);
    }

    #[test]
    fn test_failed_carries_suggestion() {
        let result = ExecutionResult::failed(id(), Duration::from_millis(120), "3 tests failed")
            .with_fix_suggestion("run pytest -x");
        assert!(result.is_failed());
        assert!(!result.is_passed());
        assert_eq!(result.error.as_deref(), Some("3 tests failed"));
        assert_eq!(result.fix_suggestion.as_deref(), Some("run pytest -x"));
        assert_eq!(result.to_string(), "python:tests: failed (0.12s)");
    }

    #[test]
    fn test_scope_format_compact() {
        assert_eq!(ScopeInfo::new(47, 3_200).format_compact(), "47 files · 3,200 LOC");
        assert_eq!(ScopeInfo::new(12, 15_400).format_compact(), "12 files · 15.4k LOC");
        assert_eq!(ScopeInfo::new(0, 0).format_compact(), "");
        assert_eq!(ScopeInfo::new(1, 2) + ScopeInfo::new(3, 4), ScopeInfo::new(4, 6));
    }

    #[test]
    fn test_definition_builder() {
        let def = CheckDefinition::new(id(), "Tests")
            .depends_on("python:lint")
            .unwrap()
            .with_auto_fix(true);
        assert_eq!(def.depends_on, vec![CheckId::new("python", "lint")]);
        assert!(def.auto_fix);
        assert!(CheckDefinition::new(id(), "Tests").depends_on("lint").is_err());
    }
}
