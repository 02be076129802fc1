use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;

use super::context::ActionContext;
use super::deps::DependencyKey;
use super::outcome::ActionOutcome;

/// Automation for one leaf task.
#[async_trait]
pub trait Action: Send + Sync {
    /// Dependency types this action will ask for. Checked before the run starts.
    fn requires(&self) -> Vec<DependencyKey> {
        Vec::new()
    }

    async fn run(&self, ctx: ActionContext) -> ActionOutcome;
}

type ActionFn = dyn Fn(ActionContext) -> BoxFuture<'static, ActionOutcome> + Send + Sync;

struct FnAction {
    requires: Vec<DependencyKey>,
    f: Box<ActionFn>,
}

#[async_trait]
impl Action for FnAction {
    fn requires(&self) -> Vec<DependencyKey> {
        self.requires.clone()
    }

    async fn run(&self, ctx: ActionContext) -> ActionOutcome {
        (self.f)(ctx).await
    }
}

/// Startup-time table of task name -> action.
#[derive(Default, Clone)]
pub struct ActionRegistry {
    actions: BTreeMap<String, Arc<dyn Action>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<A>(&mut self, name: impl Into<String>, action: A) -> &mut Self
    where
        A: Action + 'static,
    {
        self.insert(name.into(), Arc::new(action));
        self
    }

    /// Register an async closure.
    ///
    /// ```ignore
    /// registry.register_fn("start_stream", vec![DependencyKey::of::<RunContext>()], |ctx| async move {
    ///     let run = ctx.dep::<RunContext>()?;
    ///     anyhow::Ok(())
    /// });
    /// ```
    pub fn register_fn<F, Fut, O>(
        &mut self,
        name: impl Into<String>,
        requires: Vec<DependencyKey>,
        f: F,
    ) -> &mut Self
    where
        F: Fn(ActionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = O> + Send + 'static,
        O: Into<ActionOutcome> + 'static,
    {
        let f: Box<ActionFn> =
            Box::new(move |ctx: ActionContext| -> BoxFuture<'static, ActionOutcome> {
                f(ctx).map(Into::into).boxed()
            });
        self.insert(name.into(), Arc::new(FnAction { requires, f }));
        self
    }

    fn insert(&mut self, name: String, action: Arc<dyn Action>) {
        if self.actions.insert(name.clone(), action).is_some() {
            tracing::warn!(action = %name, "action registered twice; keeping the latest");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Action>> {
        self.actions.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.actions.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::DependencyRegistry;
    use crate::cancel::CancellationToken;
    use crate::executor::{ProgressKey, StatusReporter};
    use crate::state::{ProblemLevel, TaskStatus, UserResponse};
    use pretty_assertions::assert_eq;

    struct Silent;

    #[async_trait]
    impl StatusReporter for Silent {
        fn name(&self) -> &str {
            "silent"
        }
        fn report_status(&self, _: &str, _: Option<usize>, _: TaskStatus, _: &str) {}
        fn report_problem(&self, _: &str, _: ProblemLevel, _: &str, _: Option<&str>) {}
        async fn wait_for_human(
            &self,
            _: &str,
            _: Option<usize>,
            _: &str,
            _: &[UserResponse],
        ) -> UserResponse {
            UserResponse::Skip
        }
        fn create_progress(&self, _: &str, _: &str, _: f64, _: &str) -> ProgressKey {
            ProgressKey(0)
        }
        fn update_progress(&self, _: ProgressKey, _: f64) {}
        fn delete_progress(&self, _: ProgressKey) {}
    }

    fn context(task: &str) -> ActionContext {
        ActionContext::new(
            task,
            1,
            0,
            Arc::new(DependencyRegistry::new()),
            Arc::new(Silent),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_closures_returning_results_or_outcomes() {
        let mut registry = ActionRegistry::new();
        registry
            .register_fn("ok", vec![], |_ctx| async { anyhow::Ok(()) })
            .register_fn("broken", vec![], |_ctx| async {
                Err::<(), _>(anyhow::anyhow!("projector offline"))
            })
            .register_fn("manual", vec![], |_ctx| async {
                ActionOutcome::not_implemented("do it by hand")
            });

        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["broken", "manual", "ok"]);
        async fn run(registry: &ActionRegistry, name: &str) -> ActionOutcome {
            let action = registry.get(name).unwrap();
            action.run(context(name)).await
        }

        assert!(run(&registry, "ok").await.is_success());
        assert!(matches!(
            run(&registry, "broken").await,
            ActionOutcome::Failure { message, .. } if message.contains("projector offline")
        ));
        assert!(matches!(run(&registry, "manual").await, ActionOutcome::NotImplemented { .. }));
        assert!(registry.get("missing").is_none());
    }
}
