//! Dependency resolution for checks.

use gatehouse_core::{CheckId, ExecutionResult, GateStatus, QualityConfig, SkipReason};
use gatehouse_quality::{CheckInstance, CheckRegistry};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{ExecutionError, Result};

/// A check switched off by configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisabledCheck {
    /// The check
    pub id: CheckId,
    /// Why it is off
    pub reason: String,
}

/// Prepares the working set of checks for a run.
pub struct DependencyResolver;

impl DependencyResolver {
    /// Create a new resolver.
    pub fn new() -> Self {
        Self
    }

    /// Add every declared dependency that was not requested, transitively.
    ///
    /// Requested checks keep their order; dependencies are appended in the
    /// order they are discovered. Unknown dependencies are ignored.
    pub fn expand_dependencies(
        &self,
        registry: &CheckRegistry,
        instances: Vec<CheckInstance>,
        config: &QualityConfig,
    ) -> Vec<CheckInstance> {
        let mut known: HashSet<CheckId> = instances.iter().map(|i| i.id().clone()).collect();
        let mut to_process: VecDeque<CheckInstance> = instances.iter().cloned().collect();
        let mut expanded = instances;

        while let Some(instance) = to_process.pop_front() {
            for dep in instance.depends_on() {
                if known.contains(dep) {
                    continue;
                }
                known.insert(dep.clone());

                match registry.instantiate(dep, config) {
                    Some(dep_instance) => {
                        info!("Auto-including {} (dependency of {})", dep, instance.id());
                        to_process.push_back(dep_instance.clone());
                        expanded.push(dep_instance);
                    }
                    None => warn!("Unknown dependency {} of {}", dep, instance.id()),
                }
            }
        }

        expanded
    }

    /// Split off checks disabled by configuration, and every check that
    /// depends on a disabled one.
    pub fn filter_enabled(
        &self,
        instances: Vec<CheckInstance>,
        config: &QualityConfig,
    ) -> (Vec<CheckInstance>, Vec<DisabledCheck>) {
        let mut disabled: Vec<DisabledCheck> = instances
            .iter()
            .filter_map(|i| match config.gate_status(i.id()) {
                GateStatus::Enabled => None,
                GateStatus::Disabled(reason) => Some(DisabledCheck {
                    id: i.id().clone(),
                    reason,
                }),
            })
            .collect();
        let mut off: HashSet<CheckId> = disabled.iter().map(|d| d.id.clone()).collect();

        let mut changed = true;
        while changed {
            changed = false;
            for instance in &instances {
                if off.contains(instance.id()) {
                    continue;
                }
                if let Some(dep) = instance.depends_on().iter().find(|d| off.contains(*d)) {
                    disabled.push(DisabledCheck {
                        id: instance.id().clone(),
                        reason: format!("dependency {dep} is disabled"),
                    });
                    off.insert(instance.id().clone());
                    changed = true;
                }
            }
        }

        let enabled = instances
            .into_iter()
            .filter(|i| !off.contains(i.id()))
            .collect();
        (enabled, disabled)
    }

    /// Split off checks that do not apply to the project, materialized as
    /// zero-duration NotApplicable results.
    pub fn filter_applicable(
        &self,
        instances: Vec<CheckInstance>,
        project_root: &Path,
    ) -> (Vec<CheckInstance>, Vec<ExecutionResult>) {
        let mut applicable = Vec::with_capacity(instances.len());
        let mut skipped = Vec::new();

        for instance in instances {
            let check = instance.check();
            if check.is_applicable(project_root) {
                applicable.push(instance);
            } else {
                let reason = check.skip_reason(project_root);
                debug!("Not applicable: {}: {}", instance.id(), reason);
                skipped.push(
                    ExecutionResult::skipped(instance.id().clone(), SkipReason::NotApplicable)
                        .with_output(reason),
                );
            }
        }

        (applicable, skipped)
    }

    /// Build the dependency graph of the working set.
    ///
    /// Dependencies outside the set are ignored. Fails if the remaining
    /// edges form a cycle.
    pub fn build_graph(&self, instances: &[CheckInstance]) -> Result<DepGraph> {
        let present: HashSet<&CheckId> = instances.iter().map(|i| i.id()).collect();
        let order: Vec<CheckId> = instances.iter().map(|i| i.id().clone()).collect();

        let mut graph: HashMap<CheckId, Vec<CheckId>> = HashMap::new();
        let mut reverse: HashMap<CheckId, Vec<CheckId>> = HashMap::new();

        for instance in instances {
            let mut deps: Vec<CheckId> = Vec::new();
            for dep in instance.depends_on() {
                if present.contains(dep) && !deps.contains(dep) {
                    deps.push(dep.clone());
                    reverse.entry(dep.clone()).or_default().push(instance.id().clone());
                }
            }
            graph.insert(instance.id().clone(), deps);
        }

        let graph = DepGraph { order, graph, reverse };
        graph.topological_sort()?;
        Ok(graph)
    }
}

impl Default for DependencyResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// A dependency graph restricted to the checks of one run.
#[derive(Debug, Clone)]
pub struct DepGraph {
    /// Working-set order
    order: Vec<CheckId>,
    /// check -> [dependencies]
    graph: HashMap<CheckId, Vec<CheckId>>,
    /// check -> [dependents]
    reverse: HashMap<CheckId, Vec<CheckId>>,
}

impl DepGraph {
    /// Checks in working-set order.
    pub fn order(&self) -> &[CheckId] {
        &self.order
    }

    /// Dependencies of a check that are present in the run.
    pub fn dependencies_of(&self, id: &CheckId) -> &[CheckId] {
        self.graph.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Checks in the run that depend on `id`.
    pub fn dependents_of(&self, id: &CheckId) -> &[CheckId] {
        self.reverse.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of checks.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Checks ordered so that dependencies come first, ties broken by
    /// working-set order.
    pub fn topological_sort(&self) -> Result<Vec<CheckId>> {
        let mut in_degree: HashMap<&CheckId, usize> = self
            .order
            .iter()
            .map(|id| (id, self.dependencies_of(id).len()))
            .collect();

        let mut ready: VecDeque<&CheckId> = self
            .order
            .iter()
            .filter(|id| in_degree[id] == 0)
            .collect();
        let mut sorted = Vec::with_capacity(self.order.len());

        while let Some(id) = ready.pop_front() {
            sorted.push(id.clone());
            for dependent in self.dependents_of(id) {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push_back(dependent);
                    }
                }
            }
        }

        if sorted.len() != self.order.len() {
            let stuck = self
                .order
                .iter()
                .filter(|id| in_degree[id] > 0)
                .cloned()
                .collect();
            return Err(ExecutionError::DependencyCycle { checks: stuck });
        }

        Ok(sorted)
    }
}
