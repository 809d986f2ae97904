//! Progress notifications from a run.

use gatehouse_core::{CheckId, ExecutionResult};

/// Receives progress events from the executor.
///
/// All methods are called from the coordinating task, one at a time.
/// `on_complete` fires exactly once per result, in completion order.
pub trait ExecutionObserver: Send + Sync {
    /// A check was switched off by configuration. It gets no result.
    fn on_disabled(&self, _check: &CheckId, _reason: &str) {}

    /// A check was found not applicable before scheduling.
    fn on_not_applicable(&self, _result: &ExecutionResult) {}

    /// Number of checks that will be scheduled.
    fn on_total(&self, _total: usize) {}

    /// Checks registered as pending, in working-set order.
    fn on_pending(&self, _checks: &[CheckId]) {}

    /// A check is about to start.
    fn on_start(&self, _check: &CheckId) {}

    /// A check reached a terminal result.
    fn on_complete(&self, _result: &ExecutionResult) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ExecutionObserver for NoopObserver {}

/// Adapts a closure to `on_complete`.
pub struct ProgressCallback<F>(pub F);

impl<F> ExecutionObserver for ProgressCallback<F>
where
    F: Fn(&ExecutionResult) + Send + Sync,
{
    fn on_complete(&self, result: &ExecutionResult) {
        (self.0)(result)
    }
}
