//! The check executor - schedules checks and collects their results.

use futures::FutureExt;
use gatehouse_core::{CheckId, ExecutionResult, ExecutionSummary, QualityConfig, SkipReason};
use gatehouse_quality::{Check, CheckInstance, CheckRegistry};
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::{self, JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::dependency::{DepGraph, DependencyResolver};
use crate::error::{ExecutionError, Result};
use crate::observer::{ExecutionObserver, NoopObserver, ProgressCallback};
use crate::scheduler::{Budget, ResourceScheduler};

/// Configuration for the executor.
#[derive(Debug, Clone, Default)]
pub struct ExecutorConfig {
    /// Worker budget
    pub budget: Budget,
}

/// Per-run switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Attempt remediation before evaluating checks that support it
    pub auto_fix: bool,
    /// Stop scheduling new checks after the first failure
    pub fail_fast: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            auto_fix: true,
            fail_fast: true,
        }
    }
}

/// Runs checks with bounded concurrency, honoring dependencies.
///
/// ```text
/// Resolve names → Expand dependencies → Filter → Schedule → Summarize
/// ```
pub struct CheckExecutor {
    registry: Arc<CheckRegistry>,
    resolver: DependencyResolver,
    config: ExecutorConfig,
    observer: Arc<dyn ExecutionObserver>,
}

impl CheckExecutor {
    /// Create a new executor over a registry.
    pub fn new(registry: Arc<CheckRegistry>) -> Self {
        Self {
            registry,
            resolver: DependencyResolver::new(),
            config: ExecutorConfig::default(),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the progress observer.
    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Call `callback` once per terminal result.
    pub fn with_progress_callback<F>(self, callback: F) -> Self
    where
        F: Fn(&ExecutionResult) + Send + Sync + 'static,
    {
        self.with_observer(Arc::new(ProgressCallback(callback)))
    }

    /// Get a reference to the registry.
    pub fn registry(&self) -> &CheckRegistry {
        &self.registry
    }

    /// Run the named checks and aliases against a project.
    ///
    /// Each call starts from fresh state. Gate outcomes, including checks
    /// that error or panic, end up in the summary; only scheduling faults
    /// such as a dependency cycle fail the call.
    pub async fn run_checks<S: AsRef<str>>(
        &self,
        project_root: &Path,
        names: &[S],
        config: &QualityConfig,
        options: RunOptions,
    ) -> Result<ExecutionSummary> {
        let start = Instant::now();

        let requested = self.registry.resolve(names, config);
        if requested.is_empty() {
            warn!("No checks to run");
            return Ok(ExecutionSummary::empty(start.elapsed()));
        }

        let instances = self.resolver.expand_dependencies(&self.registry, requested, config);

        let (enabled, disabled) = self.resolver.filter_enabled(instances, config);
        for check in &disabled {
            info!("Disabled: {}: {}", check.id, check.reason);
            self.observer.on_disabled(&check.id, &check.reason);
        }
        if enabled.is_empty() {
            warn!("All checks are disabled");
            return Ok(ExecutionSummary::empty(start.elapsed()));
        }

        let order: Vec<CheckId> = enabled.iter().map(|i| i.id().clone()).collect();
        let (applicable, not_applicable) = self.resolver.filter_applicable(enabled, project_root);

        let mut results: HashMap<CheckId, ExecutionResult> = HashMap::new();
        for result in not_applicable {
            self.observer.on_not_applicable(&result);
            self.observer.on_complete(&result);
            results.insert(result.check.clone(), result);
        }

        let graph = self.resolver.build_graph(&applicable)?;
        if !graph.is_empty() {
            self.observer.on_total(graph.len());
            self.observer.on_pending(graph.order());

            let executed = self
                .execute_with_dependencies(applicable, &graph, project_root, options)
                .await?;
            results.extend(executed);
        }

        let ordered = order.iter().filter_map(|id| results.remove(id)).collect();
        let summary = ExecutionSummary::from_results(ordered, start.elapsed());

        info!(
            "Ran {} checks: {} passed, {} failed, {} errors",
            summary.total_checks(),
            summary.passed(),
            summary.failed(),
            summary.errors()
        );
        Ok(summary)
    }

    async fn execute_with_dependencies(
        &self,
        instances: Vec<CheckInstance>,
        graph: &DepGraph,
        project_root: &Path,
        options: RunOptions,
    ) -> Result<HashMap<CheckId, ExecutionResult>> {
        let units: HashMap<CheckId, CheckInstance> = instances
            .into_iter()
            .map(|i| (i.id().clone(), i))
            .collect();
        let root: Arc<Path> = Arc::from(project_root);

        let mut state = RunState::new(graph, self.config.budget, self.observer.as_ref());
        let mut in_flight: JoinSet<(CheckId, ExecutionResult)> = JoinSet::new();

        while (!state.pending.is_empty() || !in_flight.is_empty()) && !state.stopped {
            let mut progressed = false;

            let mut ready = Vec::new();
            let mut blocked_by_failure = Vec::new();
            for id in &state.pending {
                match state.readiness(id) {
                    Readiness::Ready => ready.push(id.clone()),
                    Readiness::DependencyFailed(dependency) => {
                        blocked_by_failure.push((id.clone(), dependency))
                    }
                    Readiness::Waiting => {}
                }
            }

            for (id, dependency) in blocked_by_failure {
                debug!("Skipping {}: dependency {} did not pass", id, dependency);
                state.pending.retain(|p| p != &id);
                state.finish(ExecutionResult::skipped(
                    id,
                    SkipReason::DependencyFailed { dependency },
                ));
                progressed = true;
            }

            for id in ready {
                if !state.scheduler.can_start() {
                    break;
                }
                let Some(unit) = units.get(&id) else { continue };

                state.pending.retain(|p| p != &id);
                state.scheduler.check_started();
                self.observer.on_start(&id);
                spawn_check(&mut in_flight, unit, Arc::clone(&root), options.auto_fix);
                progressed = true;
            }

            if let Some(joined) = in_flight.join_next().await {
                let (id, result) = joined.map_err(worker_lost)?;
                state.complete(id, result, options.fail_fast);

                // Record everything that finished alongside it before
                // submitting more, so a failure among them stops the run.
                while let Some(joined) = in_flight.try_join_next() {
                    let (id, result) = joined.map_err(worker_lost)?;
                    state.complete(id, result, options.fail_fast);
                }
            } else if !progressed {
                break;
            }
        }

        // Let running checks finish; cancellation never interrupts them.
        while let Some(joined) = in_flight.join_next().await {
            let (id, result) = joined.map_err(worker_lost)?;
            state.complete(id, result, false);
        }

        if !state.pending.is_empty() {
            if !state.stopped {
                return Err(ExecutionError::Stalled {
                    checks: state.pending.clone(),
                });
            }

            for id in std::mem::take(&mut state.pending) {
                let reason = match state.failed_dependency(&id) {
                    Some(dependency) => SkipReason::DependencyFailed { dependency },
                    None => SkipReason::FailFast,
                };
                state.finish(ExecutionResult::skipped(id, reason));
            }
        }

        debug!("Peak concurrency: {}", state.scheduler.peak());
        Ok(state.results)
    }
}

/// Run checks with a one-off executor.
pub async fn run_checks<S: AsRef<str>>(
    registry: Arc<CheckRegistry>,
    project_root: &Path,
    names: &[S],
    config: &QualityConfig,
    options: RunOptions,
) -> Result<ExecutionSummary> {
    CheckExecutor::new(registry)
        .run_checks(project_root, names, config, options)
        .await
}

enum Readiness {
    Ready,
    Waiting,
    DependencyFailed(CheckId),
}

/// Scheduling state of one run, owned by the coordinating task.
struct RunState<'a> {
    graph: &'a DepGraph,
    observer: &'a dyn ExecutionObserver,
    scheduler: ResourceScheduler,
    pending: Vec<CheckId>,
    completed: HashSet<CheckId>,
    results: HashMap<CheckId, ExecutionResult>,
    stopped: bool,
}

impl<'a> RunState<'a> {
    fn new(graph: &'a DepGraph, budget: Budget, observer: &'a dyn ExecutionObserver) -> Self {
        Self {
            graph,
            observer,
            scheduler: ResourceScheduler::new(budget),
            pending: graph.order().to_vec(),
            completed: HashSet::new(),
            results: HashMap::new(),
            stopped: false,
        }
    }

    fn readiness(&self, id: &CheckId) -> Readiness {
        let deps = self.graph.dependencies_of(id);
        if !deps.iter().all(|d| self.completed.contains(d)) {
            return Readiness::Waiting;
        }
        match self.failed_dependency(id) {
            Some(dependency) => Readiness::DependencyFailed(dependency),
            None => Readiness::Ready,
        }
    }

    // First completed dependency that did not pass.
    fn failed_dependency(&self, id: &CheckId) -> Option<CheckId> {
        self.graph
            .dependencies_of(id)
            .iter()
            .find(|d| self.results.get(*d).is_some_and(|r| !r.is_passed()))
            .cloned()
    }

    fn complete(&mut self, id: CheckId, mut result: ExecutionResult, fail_fast: bool) {
        self.scheduler.check_completed();
        result.check = id;
        if fail_fast && result.is_failed() && !self.stopped {
            debug!("Fail-fast triggered by {}", result.check);
            self.stopped = true;
        }
        self.finish(result);
    }

    fn finish(&mut self, result: ExecutionResult) {
        if self.results.contains_key(&result.check) {
            return;
        }
        self.completed.insert(result.check.clone());
        self.observer.on_complete(&result);
        self.results.insert(result.check.clone(), result);
    }
}

// Dropping the set aborts every check still running in it.
fn spawn_check(
    in_flight: &mut JoinSet<(CheckId, ExecutionResult)>,
    unit: &CheckInstance,
    root: Arc<Path>,
    auto_fix: bool,
) {
    let id = unit.id().clone();
    let check = unit.check();

    in_flight.spawn(async move {
        let started = Instant::now();
        let invocation = AssertUnwindSafe(invoke_check(check, id.clone(), root, auto_fix));
        let result = match invocation.catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                let message = format!("check panicked: {}", panic_message(payload.as_ref()));
                error!("Check {} failed to run: {}", id, message);
                ExecutionResult::errored(id.clone(), started.elapsed(), message)
            }
        };
        (id, result)
    });
}

async fn invoke_check(
    check: Arc<dyn Check>,
    id: CheckId,
    root: Arc<Path>,
    auto_fix: bool,
) -> ExecutionResult {
    debug!("Running {}", check.display_name());

    let scope_check = Arc::clone(&check);
    let scope_root = Arc::clone(&root);
    let scope = task::spawn_blocking(move || scope_check.measure_scope(&scope_root));

    let mut fixed = false;
    if auto_fix && check.can_auto_fix() {
        match AssertUnwindSafe(check.auto_fix(&root)).catch_unwind().await {
            Ok(Ok(changed)) => {
                if changed {
                    debug!("Auto-fixed issues for {}", id);
                }
                fixed = changed;
            }
            Ok(Err(e)) => warn!("Auto-fix failed for {}: {:#}", id, e),
            Err(payload) => warn!(
                "Auto-fix panicked for {}: {}",
                id,
                panic_message(payload.as_ref())
            ),
        }
    }

    let start = Instant::now();
    let mut result = match check.execute(&root).await {
        Ok(result) => result,
        Err(e) => {
            error!("Check {} could not be evaluated: {:#}", id, e);
            ExecutionResult::errored(id.clone(), start.elapsed(), format!("{e:#}"))
        }
    };

    result.check = id;
    result.auto_fixed |= fixed;
    if result.scope.is_none() {
        result.scope = match scope.await {
            Ok(scope) => scope,
            Err(e) => {
                warn!("Measuring scope failed for {}: {}", result.check, e);
                None
            }
        };
    }
    result
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

fn worker_lost(e: JoinError) -> ExecutionError {
    ExecutionError::WorkerLost(e.to_string())
}
