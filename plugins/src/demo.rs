//! Demo checklist and actions behind `autocheck --demo`.
//!
//! Covers each path through the engine: automatic success, a failing action,
//! an action that asks for a human, progress bars, and a long wait that
//! `cancel wait_for_doors` or Ctrl+C interrupts.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use autocheck_core::action::{ActionOutcome, ActionRegistry, DependencyKey, DependencyRegistry};
use autocheck_core::context::RunContext;

pub const DEMO_TASKS: &str = include_str!("../../demos/demo_tasks.json");

/// Stand-in for the studio settings a real deployment would load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoStudio {
    pub name: String,
    pub ingest_url: String,
    pub slide_count: u32,
}

impl Default for DemoStudio {
    fn default() -> Self {
        Self {
            name: "Studio A".to_string(),
            ingest_url: "rtmp://ingest.example.com/live".to_string(),
            slide_count: 5,
        }
    }
}

/// Register the demo actions and the dependencies they need.
pub fn register(actions: &mut ActionRegistry, deps: &mut DependencyRegistry) {
    deps.insert(Arc::new(DemoStudio::default()));

    actions.register_fn(
        "upload_slides",
        vec![DependencyKey::of::<DemoStudio>()],
        |ctx| async move {
            let studio = ctx.dep::<DemoStudio>()?;
            let total = studio.slide_count;
            ctx.allow_cancel();
            let bar = ctx.progress("Uploading slides", total as f64, "files");
            for done in 1..=total {
                ctx.check_cancelled()?;
                ctx.sleep(Duration::from_millis(400)).await?;
                bar.set(done as f64);
            }
            anyhow::Ok(())
        },
    );

    actions.register_fn(
        "check_stream_key",
        vec![DependencyKey::of::<RunContext>(), DependencyKey::of::<DemoStudio>()],
        |ctx| async move {
            let run = ctx.dep::<RunContext>()?;
            let studio = ctx.dep::<DemoStudio>()?;
            ctx.sleep(Duration::from_millis(300)).await?;
            tracing::info!(studio = %studio.name, date = %run.run_date, "stream key accepted");
            anyhow::Ok(())
        },
    );

    actions.register_fn(
        "start_stream",
        vec![DependencyKey::of::<DemoStudio>()],
        |ctx| async move {
            let studio = ctx.dep::<DemoStudio>()?;
            ctx.sleep(Duration::from_millis(500)).await?;
            Err::<(), _>(anyhow::anyhow!("connection refused"))
                .with_context(|| format!("encoder did not answer at {}", studio.ingest_url))
        },
    );

    actions.register_fn("post_announcement", vec![], |_ctx| async {
        ActionOutcome::NotImplemented {
            message: "Posting needs a signed-in browser session. Post the link by hand, or retry once you are signed in."
                .to_string(),
            allow_retry: true,
        }
    });

    actions.register_fn("wait_for_doors", vec![], |ctx| async move {
        const SECONDS: u32 = 20;
        ctx.allow_cancel();
        let bar = ctx.progress("Waiting for doors", SECONDS as f64, "s");
        for elapsed in 1..=SECONDS {
            ctx.sleep(Duration::from_secs(1))
                .await
                .context("stopped waiting for the doors to open")?;
            bar.set(elapsed as f64);
        }
        anyhow::Ok(())
    });
}
