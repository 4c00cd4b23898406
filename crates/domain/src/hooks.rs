//! Side effects run after an event is durably appended.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{AggregateKey, Subject};
use serde::Serialize;

use crate::entity::Entity;
use crate::error::HookError;

/// A callback invoked after an event of entity `E` was committed.
///
/// Hooks run concurrently with each other once the per-key lock has been
/// released. A failing hook never undoes the commit.
#[async_trait]
pub trait CommitHook<E: Entity>: Send + Sync {
    /// Name reported when the hook fails.
    fn name(&self) -> &str;

    async fn on_commit(
        &self,
        key: &AggregateKey,
        event: &E::Event,
        subject: &Subject,
    ) -> Result<(), HookError>;
}

/// A hook that did not complete successfully.
#[derive(Debug, Clone, Serialize)]
pub struct HookFailure {
    pub hook: String,
    pub reason: String,
}

/// Combined outcome of the hooks fired for one commit.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HookReport {
    pub failures: Vec<HookFailure>,
}

impl HookReport {
    /// True when the commit succeeded but at least one hook did not.
    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Runs every hook concurrently, each bounded by `timeout`.
pub(crate) async fn run_hooks<E: Entity>(
    hooks: &[Arc<dyn CommitHook<E>>],
    timeout: Duration,
    key: &AggregateKey,
    event: &E::Event,
    subject: &Subject,
) -> HookReport {
    if hooks.is_empty() {
        return HookReport::default();
    }

    let outcomes = futures_util::future::join_all(hooks.iter().map(|hook| async move {
        let outcome = match tokio::time::timeout(timeout, hook.on_commit(key, event, subject)).await
        {
            Ok(result) => result,
            Err(_) => Err(HookError::TimedOut(timeout)),
        };
        (hook.name().to_string(), outcome)
    }))
    .await;

    let failures: Vec<HookFailure> = outcomes
        .into_iter()
        .filter_map(|(hook, outcome)| {
            outcome.err().map(|error| HookFailure {
                hook,
                reason: error.to_string(),
            })
        })
        .collect();

    for failure in &failures {
        tracing::warn!(
            key = %key,
            hook = %failure.hook,
            reason = %failure.reason,
            "post-commit hook failed"
        );
        metrics::counter!("post_commit_hook_failures_total", "entity" => E::ENTITY_TYPE.as_str())
            .increment(1);
    }

    HookReport { failures }
}
