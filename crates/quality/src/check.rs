//! The check contract.

use async_trait::async_trait;
use gatehouse_core::{CheckDefinition, CheckId, ExecutionResult, ScopeInfo};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// A pluggable quality gate.
///
/// Implementations are created per run by a factory registered with
/// [`CheckRegistry`](crate::CheckRegistry), so they may hold their gate
/// settings by value.
#[async_trait]
pub trait Check: Send + Sync {
    /// Qualified id (`category:name`).
    fn id(&self) -> CheckId;

    /// Human-readable label.
    fn display_name(&self) -> String;

    /// Checks that must pass before this one runs.
    fn depends_on(&self) -> Vec<CheckId> {
        Vec::new()
    }

    /// Whether running this check against the project makes sense.
    fn is_applicable(&self, project_root: &Path) -> bool;

    /// Explanation reported when [`is_applicable`](Check::is_applicable) is false.
    fn skip_reason(&self, _project_root: &Path) -> String {
        "not applicable to this project".to_string()
    }

    /// Evaluate the gate.
    ///
    /// An `Err` means the gate could not be evaluated and is reported as
    /// an Error result. A gate that was evaluated and not met returns
    /// `Ok` with a Failed result.
    async fn execute(&self, project_root: &Path) -> anyhow::Result<ExecutionResult>;

    /// Whether [`auto_fix`](Check::auto_fix) does anything.
    fn can_auto_fix(&self) -> bool {
        false
    }

    /// Best-effort remediation. Returns whether anything was changed.
    async fn auto_fix(&self, _project_root: &Path) -> anyhow::Result<bool> {
        Ok(false)
    }

    /// Lightweight measure of what the check will examine.
    fn measure_scope(&self, _project_root: &Path) -> Option<ScopeInfo> {
        None
    }
}

/// A check bound to its configuration for one run.
#[derive(Clone)]
pub struct CheckInstance {
    id: CheckId,
    depends_on: Vec<CheckId>,
    check: Arc<dyn Check>,
}

impl CheckInstance {
    /// Wrap a freshly created check.
    pub fn new(check: Box<dyn Check>) -> Self {
        let check: Arc<dyn Check> = Arc::from(check);
        Self {
            id: check.id(),
            depends_on: check.depends_on(),
            check,
        }
    }

    /// Qualified id.
    pub fn id(&self) -> &CheckId {
        &self.id
    }

    /// Declared dependencies.
    pub fn depends_on(&self) -> &[CheckId] {
        &self.depends_on
    }

    /// Shared handle to the check, for moving into a worker.
    pub fn check(&self) -> Arc<dyn Check> {
        Arc::clone(&self.check)
    }

    /// Definition derived from the check itself.
    pub fn definition(&self) -> CheckDefinition {
        CheckDefinition {
            id: self.id.clone(),
            display_name: self.check.display_name(),
            depends_on: self.depends_on.clone(),
            auto_fix: self.check.can_auto_fix(),
        }
    }
}

impl fmt::Debug for CheckInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckInstance")
            .field("id", &self.id)
            .field("depends_on", &self.depends_on)
            .finish_non_exhaustive()
    }
}
