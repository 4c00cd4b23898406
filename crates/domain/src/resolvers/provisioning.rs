//! Scope initialization: new projects get an in-project resolver.

use std::sync::Arc;

use async_trait::async_trait;
use common::{AggregateKey, Iri, Subject};
use event_store::EventLog;

use crate::coordinator::{Command, ExpectedRevision, WriteCoordinator};
use crate::error::{CommandError, HookError};
use crate::hooks::CommitHook;
use crate::projects::{ProjectEvent, Projects};

use super::{ResolverCommand, ResolverRejection, ResolverValue, Resolvers};

/// Id of the resolver created with every project.
pub const DEFAULT_RESOLVER_ID: &str = "urn:resolver:default-in-project";

/// Creates the default in-project resolver (priority 1) when a project is
/// created. An existing default resolver counts as success, so re-running the
/// hook is harmless.
pub struct DefaultResolverHook<L> {
    resolvers: Arc<WriteCoordinator<L, Resolvers>>,
}

impl<L> DefaultResolverHook<L> {
    pub fn new(resolvers: Arc<WriteCoordinator<L, Resolvers>>) -> Self {
        Self { resolvers }
    }
}

#[async_trait]
impl<L: EventLog> CommitHook<Projects> for DefaultResolverHook<L> {
    fn name(&self) -> &str {
        "default-resolver"
    }

    async fn on_commit(
        &self,
        _key: &AggregateKey,
        event: &ProjectEvent,
        subject: &Subject,
    ) -> Result<(), HookError> {
        let ProjectEvent::ProjectCreated { project, .. } = event else {
            return Ok(());
        };
        let id = Iri::new(DEFAULT_RESOLVER_ID).map_err(|e| HookError::Failed(e.to_string()))?;

        let result = self
            .resolvers
            .submit(Command::new(
                AggregateKey::resolver(project, &id),
                ExpectedRevision::Any,
                subject.clone(),
                ResolverCommand::Create {
                    id,
                    project: project.clone(),
                    value: ResolverValue::InProject { priority: 1 },
                },
            ))
            .await;

        match result {
            Ok(_) | Err(CommandError::Rejected(ResolverRejection::AlreadyExists { .. })) => Ok(()),
            Err(e) => Err(HookError::Failed(e.to_string())),
        }
    }
}
