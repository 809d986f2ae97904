//! Quality check registry.

use gatehouse_core::{CheckDefinition, CheckId, GateSettings, QualityConfig};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::check::{Check, CheckInstance};

/// Creates a check bound to its gate settings.
pub type CheckFactory = Arc<dyn Fn(&GateSettings) -> Box<dyn Check> + Send + Sync>;

struct Registration {
    factory: CheckFactory,
    definition: CheckDefinition,
}

/// Registry for quality checks and aliases.
///
/// Built once at startup and shared read-only with the executor.
pub struct CheckRegistry {
    checks: HashMap<CheckId, Registration>,
    by_category: HashMap<String, Vec<CheckId>>,
    aliases: HashMap<String, Vec<CheckId>>,
}

impl CheckRegistry {
    /// Create a new registry.
    pub fn new() -> Self {
        Self {
            checks: HashMap::new(),
            by_category: HashMap::new(),
            aliases: HashMap::new(),
        }
    }

    /// Register a check factory.
    ///
    /// The factory is probed with empty settings to learn the check's id
    /// and derive its definition. Registering the same id again replaces
    /// the earlier entry.
    pub fn register<F>(&mut self, factory: F) -> CheckId
    where
        F: Fn(&GateSettings) -> Box<dyn Check> + Send + Sync + 'static,
    {
        let probe = CheckInstance::new(factory(&GateSettings::new()));
        let definition = probe.definition();
        self.insert(Arc::new(factory), definition)
    }

    /// Register a check factory with an explicit definition.
    ///
    /// The entry is keyed by the id of the check the factory builds. A
    /// definition carrying a different id is corrected with a warning.
    pub fn register_with_definition<F>(
        &mut self,
        factory: F,
        mut definition: CheckDefinition,
    ) -> CheckId
    where
        F: Fn(&GateSettings) -> Box<dyn Check> + Send + Sync + 'static,
    {
        let id = factory(&GateSettings::new()).id();
        if definition.id != id {
            warn!("Definition id {} does not match check {}, keeping {}", definition.id, id, id);
            definition.id = id;
        }
        self.insert(Arc::new(factory), definition)
    }

    fn insert(&mut self, factory: CheckFactory, definition: CheckDefinition) -> CheckId {
        let id = definition.id.clone();

        if self.checks.contains_key(&id) {
            warn!("Check {} registered twice, replacing earlier registration", id);
        } else {
            self.by_category
                .entry(id.category().to_string())
                .or_default()
                .push(id.clone());
        }

        self.checks.insert(id.clone(), Registration { factory, definition });
        debug!("Registered check: {}", id);
        id
    }

    /// Unregister a check.
    pub fn unregister(&mut self, id: &CheckId) -> Option<CheckDefinition> {
        let registration = self.checks.remove(id)?;
        if let Some(ids) = self.by_category.get_mut(id.category()) {
            ids.retain(|x| x != id);
        }
        Some(registration.definition)
    }

    /// Register an alias (named group of checks).
    pub fn register_alias(&mut self, alias: impl Into<String>, members: impl IntoIterator<Item = CheckId>) {
        let alias = alias.into();
        let members: Vec<CheckId> = members.into_iter().collect();
        debug!("Registered alias '{}': {:?}", alias, members);
        self.aliases.insert(alias, members);
    }

    /// Whether a name is a registered alias.
    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    /// Members of an alias.
    pub fn expand_alias(&self, alias: &str) -> Option<&[CheckId]> {
        self.aliases.get(alias).map(Vec::as_slice)
    }

    /// Definition of a registered check.
    pub fn definition(&self, id: &CheckId) -> Option<&CheckDefinition> {
        self.checks.get(id).map(|r| &r.definition)
    }

    /// Whether a check is registered.
    pub fn contains(&self, id: &CheckId) -> bool {
        self.checks.contains_key(id)
    }

    /// Instantiate one check with its fragment from `config`.
    pub fn instantiate(&self, id: &CheckId, config: &QualityConfig) -> Option<CheckInstance> {
        let registration = self.checks.get(id)?;
        let settings = config.lookup_id(id);
        Some(CheckInstance::new((registration.factory)(&settings)))
    }

    /// Turn requested names and aliases into check instances.
    ///
    /// Aliases expand one level, duplicates are removed keeping the first
    /// occurrence, and unknown names are dropped with a warning.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S], config: &QualityConfig) -> Vec<CheckInstance> {
        let mut expanded: Vec<CheckId> = Vec::new();
        for name in names {
            let name = name.as_ref();
            if let Some(members) = self.aliases.get(name) {
                expanded.extend(members.iter().cloned());
                continue;
            }
            match name.parse::<CheckId>() {
                Ok(id) => expanded.push(id),
                Err(e) => warn!("Unknown check: {} ({})", name, e),
            }
        }

        let mut seen = HashSet::new();
        expanded.retain(|id| seen.insert(id.clone()));

        expanded
            .iter()
            .filter_map(|id| {
                let instance = self.instantiate(id, config);
                if instance.is_none() {
                    warn!("Unknown check: {}", id);
                }
                instance
            })
            .collect()
    }

    /// All registered check ids, sorted.
    pub fn list_checks(&self) -> Vec<CheckId> {
        let mut ids: Vec<_> = self.checks.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// All aliases and their members.
    pub fn list_aliases(&self) -> &HashMap<String, Vec<CheckId>> {
        &self.aliases
    }

    /// Checks registered under a category, in registration order.
    pub fn find_by_category(&self, category: &str) -> Vec<&CheckDefinition> {
        self.by_category
            .get(category)
            .into_iter()
            .flat_map(|ids| ids.iter().filter_map(|id| self.definition(id)))
            .collect()
    }

    /// Every registered check that applies to the project, sorted by id.
    pub fn applicable_checks(&self, project_root: &Path, config: &QualityConfig) -> Vec<CheckInstance> {
        self.list_checks()
            .iter()
            .filter_map(|id| self.instantiate(id, config))
            .filter(|instance| instance.check().is_applicable(project_root))
            .collect()
    }

    /// Number of registered checks.
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// Whether no checks are registered.
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

impl Default for CheckRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gatehouse_core::ExecutionResult;
    use serde_json::json;
    use std::time::Duration;

    struct StaticCheck {
        category: &'static str,
        name: &'static str,
        label: &'static str,
        deps: Vec<CheckId>,
        applicable: bool,
        settings: GateSettings,
    }

    #[async_trait]
    impl Check for StaticCheck {
        fn id(&self) -> CheckId {
            CheckId::new(self.category, self.name)
        }

        fn display_name(&self) -> String {
            self.label.to_string()
        }

        fn depends_on(&self) -> Vec<CheckId> {
            self.deps.clone()
        }

        fn is_applicable(&self, _project_root: &Path) -> bool {
            self.applicable
        }

        async fn execute(&self, _project_root: &Path) -> anyhow::Result<ExecutionResult> {
            let output = self.settings.get_str("marker").unwrap_or_default().to_string();
            Ok(ExecutionResult::passed(self.id(), Duration::ZERO).with_output(output))
        }
    }

    fn register(registry: &mut CheckRegistry, name: &'static str, deps: &[&str]) -> CheckId {
        let deps: Vec<CheckId> = deps.iter().map(|d| d.parse().unwrap()).collect();
        registry.register(move |settings| {
            Box::new(StaticCheck {
                category: "python",
                name,
                label: name,
                deps: deps.clone(),
                applicable: name != "docs",
                settings: settings.clone(),
            })
        })
    }

    fn registry() -> CheckRegistry {
        let mut registry = CheckRegistry::new();
        register(&mut registry, "lint", &[]);
        register(&mut registry, "tests", &[]);
        register(&mut registry, "coverage", &["python:tests"]);
        register(&mut registry, "docs", &[]);
        registry.register_alias(
            "commit",
            ["lint", "tests", "coverage"].map(|n| CheckId::new("python", n)),
        );
        registry
    }

    fn names(instances: &[CheckInstance]) -> Vec<String> {
        instances.iter().map(|i| i.id().to_string()).collect()
    }

    #[test]
    fn test_register_derives_definition() {
        let registry = registry();
        let def = registry.definition(&CheckId::new("python", "coverage")).unwrap();
        assert_eq!(def.display_name, "coverage");
        assert_eq!(def.depends_on, vec![CheckId::new("python", "tests")]);
        assert!(!def.auto_fix);
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_reregistration_overwrites() {
        let mut registry = registry();
        let id = CheckId::new("python", "lint");
        registry.register_with_definition(
            |_| {
                Box::new(StaticCheck {
                    category: "python",
                    name: "lint",
                    label: "Lint v2",
                    deps: Vec::new(),
                    applicable: true,
                    settings: GateSettings::new(),
                })
            },
            CheckDefinition::new(id.clone(), "Lint v2").with_auto_fix(true),
        );
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.definition(&id).unwrap().display_name, "Lint v2");
        assert_eq!(registry.find_by_category("python").len(), 4);
    }

    #[test]
    fn test_definition_is_keyed_by_built_check() {
        let mut registry = CheckRegistry::new();
        let id = registry.register_with_definition(
            |_| -> Box<dyn Check> {
                Box::new(StaticCheck {
                    category: "python",
                    name: "lint",
                    label: "Lint",
                    deps: Vec::new(),
                    applicable: true,
                    settings: GateSettings::new(),
                })
            },
            CheckDefinition::new(CheckId::new("python", "lint-format"), "Lint"),
        );

        let lint = CheckId::new("python", "lint");
        assert_eq!(id, lint);
        assert!(registry.contains(&lint));
        assert!(!registry.contains(&CheckId::new("python", "lint-format")));
        assert_eq!(registry.definition(&lint).unwrap().id, lint);

        let config = QualityConfig::default();
        assert_eq!(names(&registry.resolve(&["python:lint"], &config)), vec!["python:lint"]);
        assert!(registry.resolve(&["python:lint-format"], &config).is_empty());
    }

    #[test]
    fn test_resolve_alias_dedups_preserving_order() {
        let registry = registry();
        let resolved = registry.resolve(&["commit", "python:lint"], &QualityConfig::default());
        assert_eq!(names(&resolved), vec!["python:lint", "python:tests", "python:coverage"]);

        let resolved = registry.resolve(&["python:tests", "commit"], &QualityConfig::default());
        assert_eq!(names(&resolved), vec!["python:tests", "python:lint", "python:coverage"]);
    }

    #[test]
    fn test_resolve_drops_unknown() {
        let registry = registry();
        let resolved = registry.resolve(
            &["python:lint", "python:nope", "garbage", "rust:clippy"],
            &QualityConfig::default(),
        );
        assert_eq!(names(&resolved), vec!["python:lint"]);
    }

    #[test]
    fn test_alias_expands_one_level_only() {
        let mut registry = registry();
        registry.register_alias("outer", [CheckId::new("alias", "commit")]);
        assert!(registry.resolve(&["outer"], &QualityConfig::default()).is_empty());
    }

    #[tokio::test]
    async fn test_resolve_binds_gate_settings() {
        let registry = registry();
        let config = QualityConfig::from_value(json!({
            "python": { "gates": { "lint": { "marker": "configured" } } }
        }))
        .unwrap();

        let resolved = registry.resolve(&["python:lint"], &config);
        let result = resolved[0].check().execute(Path::new(".")).await.unwrap();
        assert_eq!(result.output, "configured");
    }

    #[test]
    fn test_unregister_and_applicable() {
        let mut registry = registry();
        let applicable = registry.applicable_checks(Path::new("."), &QualityConfig::default());
        assert_eq!(
            names(&applicable),
            vec!["python:coverage", "python:lint", "python:tests"]
        );

        assert!(registry.unregister(&CheckId::new("python", "lint")).is_some());
        assert!(!registry.contains(&CheckId::new("python", "lint")));
        assert_eq!(registry.find_by_category("python").len(), 3);
    }
}
