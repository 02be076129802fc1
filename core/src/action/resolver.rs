use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::error::BindingError;
use crate::executor::graph::TaskGraph;

use super::deps::DependencyRegistry;
use super::registry::{Action, ActionRegistry};

const NONE: &str = "none";

/// How a leaf task will be executed.
#[derive(Clone)]
pub enum Binding {
    /// Run the action right away.
    Automatic(Arc<dyn Action>),
    /// The action exists but the task was left out of the automation
    /// whitelist: ask a human first and run the action only on Retry.
    Gated(Arc<dyn Action>),
    /// No action registered; a human does the task.
    Manual,
}

impl Binding {
    pub fn action(&self) -> Option<&Arc<dyn Action>> {
        match self {
            Self::Automatic(a) | Self::Gated(a) => Some(a),
            Self::Manual => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Automatic(_) => "automatic",
            Self::Gated(_) => "gated",
            Self::Manual => "manual",
        }
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}

#[derive(Debug, Clone)]
pub struct BoundTask {
    pub binding: Binding,
    /// Definition flag, or forced for this run.
    pub only_auto: bool,
}

/// Output of the pre-flight pass: one binding per leaf.
#[derive(Debug, Clone, Default)]
pub struct ResolvedPlan {
    tasks: HashMap<String, BoundTask>,
    /// Registered actions no leaf task uses.
    pub unused_actions: Vec<String>,
    /// Report `unused_actions` as a warning when the run starts.
    pub warn_unused: bool,
}

impl ResolvedPlan {
    pub fn get(&self, task: &str) -> Option<&BoundTask> {
        self.tasks.get(task)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.tasks
            .values()
            .filter(|t| t.binding.kind() == kind)
            .count()
    }
}

/// Binds every leaf task to an action before anything runs.
pub struct ActionResolver<'a> {
    actions: &'a ActionRegistry,
    deps: &'a DependencyRegistry,
    auto: Option<Vec<String>>,
    forced_only_auto: Vec<String>,
    warn_unused: bool,
}

impl<'a> ActionResolver<'a> {
    pub fn new(actions: &'a ActionRegistry, deps: &'a DependencyRegistry) -> Self {
        Self {
            actions,
            deps,
            auto: None,
            forced_only_auto: Vec::new(),
            warn_unused: true,
        }
    }

    /// Only these tasks run automatically. `["none"]` automates nothing.
    /// Without a whitelist every bound task is automated.
    pub fn auto_whitelist(mut self, names: Option<Vec<String>>) -> Self {
        self.auto = names;
        self
    }

    /// Treat these tasks (or every leaf under these composites) as only_auto.
    pub fn force_only_auto(mut self, names: Vec<String>) -> Self {
        self.forced_only_auto = names;
        self
    }

    pub fn warn_unused(mut self, warn: bool) -> Self {
        self.warn_unused = warn;
        self
    }

    pub fn resolve(&self, graph: &TaskGraph) -> Result<ResolvedPlan, BindingError> {
        let whitelist = self.whitelist(graph)?;
        let forced = self.forced(graph)?;

        let unused_actions: Vec<String> = self
            .actions
            .names()
            .filter(|name| !graph.contains(name))
            .map(str::to_string)
            .collect();

        let mut tasks = HashMap::with_capacity(graph.len());
        for leaf in graph.leaves() {
            let action = self.actions.get(&leaf.name);
            if let Some(action) = &action {
                for key in action.requires() {
                    if !self.deps.contains(&key) {
                        return Err(BindingError::MissingDependency {
                            action: leaf.name.clone(),
                            type_name: key.type_name(),
                        });
                    }
                }
            }

            let only_auto = leaf.only_auto || forced.contains(leaf.name.as_str());
            let whitelisted = whitelist
                .as_ref()
                .map(|w| w.contains(leaf.name.as_str()));

            let binding = match (action, whitelisted) {
                (None, _) if only_auto => {
                    return Err(BindingError::OnlyAutoWithoutAction(leaf.name.clone()))
                }
                (None, Some(true)) => {
                    return Err(BindingError::AutoTaskWithoutAction(leaf.name.clone()))
                }
                (None, _) => Binding::Manual,
                (Some(_), Some(false)) if only_auto => {
                    return Err(BindingError::OnlyAutoNotAutomated(leaf.name.clone()))
                }
                (Some(a), None | Some(true)) => Binding::Automatic(a),
                (Some(a), Some(false)) => Binding::Gated(a),
            };
            tracing::debug!(task = %leaf.name, binding = binding.kind(), only_auto, "task bound");
            tasks.insert(leaf.name.clone(), BoundTask { binding, only_auto });
        }

        let plan = ResolvedPlan {
            tasks,
            unused_actions,
            warn_unused: self.warn_unused,
        };
        tracing::info!(
            automatic = plan.count("automatic"),
            gated = plan.count("gated"),
            manual = plan.count("manual"),
            "actions resolved"
        );
        Ok(plan)
    }

    /// A composite in the whitelist stands for every bound leaf below it.
    fn whitelist<'g>(
        &self,
        graph: &'g TaskGraph,
    ) -> Result<Option<BTreeSet<&'g str>>, BindingError> {
        let Some(names) = &self.auto else {
            return Ok(None);
        };
        if names.iter().any(|n| n.trim() == NONE) {
            if names.len() > 1 {
                return Err(BindingError::NoneNotAlone);
            }
            return Ok(Some(BTreeSet::new()));
        }
        let mut set = BTreeSet::new();
        for name in names {
            let name = name.trim();
            if let Some(leaf) = graph.leaf(name) {
                set.insert(leaf.name.as_str());
            } else if let Some(composite) = graph.composite(name) {
                set.extend(
                    composite
                        .leaves
                        .iter()
                        .filter(|l| self.actions.get(l).is_some())
                        .map(String::as_str),
                );
            } else {
                return Err(BindingError::UnknownAutoTask(name.to_string()));
            }
        }
        Ok(Some(set))
    }

    fn forced<'g>(&self, graph: &'g TaskGraph) -> Result<BTreeSet<&'g str>, BindingError> {
        let mut set = BTreeSet::new();
        for name in &self.forced_only_auto {
            let name = name.trim();
            if let Some(leaf) = graph.leaf(name) {
                set.insert(leaf.name.as_str());
            } else if let Some(composite) = graph.composite(name) {
                set.extend(composite.leaves.iter().map(String::as_str));
            } else {
                return Err(BindingError::UnknownOnlyAutoTask(name.to_string()));
            }
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionOutcome, DependencyKey};
    use crate::task;

    struct Config;

    fn graph() -> TaskGraph {
        task::from_str(
            r#"{"name": "root", "subtasks": [
                {"name": "a", "description": "x"},
                {"name": "b", "description": "x", "prerequisites": ["a"]},
                {"name": "group", "subtasks": [
                    {"name": "c", "description": "x"},
                    {"name": "d", "description": "x"}
                ]}
            ]}"#,
        )
        .unwrap()
        .graph
    }

    fn actions(names: &[&str]) -> ActionRegistry {
        let mut registry = ActionRegistry::new();
        for name in names {
            registry.register_fn(*name, vec![], |_ctx| async { ActionOutcome::Success });
        }
        registry
    }

    #[test]
    fn test_bindings_and_unused_actions() {
        let actions = actions(&["a", "c", "stale"]);
        let deps = DependencyRegistry::new();
        let plan = ActionResolver::new(&actions, &deps).resolve(&graph()).unwrap();

        assert_eq!(plan.get("a").unwrap().binding.kind(), "automatic");
        assert_eq!(plan.get("b").unwrap().binding.kind(), "manual");
        assert_eq!(plan.unused_actions, vec!["stale".to_string()]);
        assert!(plan.warn_unused);
        assert_eq!(plan.len(), 4);

        let plan = ActionResolver::new(&actions, &deps)
            .warn_unused(false)
            .resolve(&graph())
            .unwrap();
        assert!(!plan.warn_unused);
    }

    #[test]
    fn test_missing_dependency_is_fatal() {
        let mut actions = ActionRegistry::new();
        actions.register_fn("a", vec![DependencyKey::of::<Config>()], |_ctx| async {
            ActionOutcome::Success
        });
        let deps = DependencyRegistry::new();
        let err = ActionResolver::new(&actions, &deps)
            .resolve(&graph())
            .unwrap_err();
        match err {
            BindingError::MissingDependency { action, type_name } => {
                assert_eq!(action, "a");
                assert!(type_name.ends_with("Config"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let deps = DependencyRegistry::new().with(Arc::new(Config));
        assert!(ActionResolver::new(&actions, &deps).resolve(&graph()).is_ok());
    }

    #[test]
    fn test_auto_whitelist() {
        let actions = actions(&["a", "c"]);
        let deps = DependencyRegistry::new();
        let resolve = |names: &[&str]| {
            ActionResolver::new(&actions, &deps)
                .auto_whitelist(Some(names.iter().map(|s| s.to_string()).collect()))
                .resolve(&graph())
        };

        let plan = resolve(&["a"]).unwrap();
        assert_eq!(plan.get("a").unwrap().binding.kind(), "automatic");
        assert_eq!(plan.get("c").unwrap().binding.kind(), "gated");

        let plan = resolve(&["none"]).unwrap();
        assert_eq!(plan.count("gated"), 2);

        let plan = resolve(&["group"]).unwrap();
        assert_eq!(plan.get("a").unwrap().binding.kind(), "gated");
        assert_eq!(plan.get("c").unwrap().binding.kind(), "automatic");
        assert_eq!(plan.get("d").unwrap().binding.kind(), "manual");

        assert!(matches!(resolve(&["none", "a"]), Err(BindingError::NoneNotAlone)));
        assert!(matches!(resolve(&["zzz"]), Err(BindingError::UnknownAutoTask(n)) if n == "zzz"));
        assert!(matches!(resolve(&["b"]), Err(BindingError::AutoTaskWithoutAction(n)) if n == "b"));
    }

    #[test]
    fn test_forced_only_auto() {
        let actions = actions(&["a", "c", "d"]);
        let deps = DependencyRegistry::new();

        let plan = ActionResolver::new(&actions, &deps)
            .force_only_auto(vec!["group".into()])
            .resolve(&graph())
            .unwrap();
        assert!(plan.get("c").unwrap().only_auto);
        assert!(plan.get("d").unwrap().only_auto);
        assert!(!plan.get("a").unwrap().only_auto);

        let err = ActionResolver::new(&actions, &deps)
            .force_only_auto(vec!["b".into()])
            .resolve(&graph())
            .unwrap_err();
        assert!(matches!(err, BindingError::OnlyAutoWithoutAction(n) if n == "b"));

        let err = ActionResolver::new(&actions, &deps)
            .force_only_auto(vec!["c".into()])
            .auto_whitelist(Some(vec!["a".into()]))
            .resolve(&graph())
            .unwrap_err();
        assert!(matches!(err, BindingError::OnlyAutoNotAutomated(n) if n == "c"));

        let err = ActionResolver::new(&actions, &deps)
            .force_only_auto(vec!["c".into()])
            .auto_whitelist(Some(vec!["none".into()]))
            .resolve(&graph())
            .unwrap_err();
        assert!(matches!(err, BindingError::OnlyAutoNotAutomated(n) if n == "c"));

        let err = ActionResolver::new(&actions, &deps)
            .force_only_auto(vec!["nope".into()])
            .resolve(&graph())
            .unwrap_err();
        assert!(matches!(err, BindingError::UnknownOnlyAutoTask(_)));
    }
}
