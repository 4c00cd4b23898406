//! Resolver service.

use std::sync::Arc;

use common::{AggregateKey, Caller, Iri, ProjectRef, Scope, permission::resolvers};
use event_store::{EventLog, Revision};

use crate::cache::{Page, Pagination};
use crate::coordinator::{Command, Committed, ExpectedRevision, WriteCoordinator};
use crate::error::{CommandError, FetchError};
use crate::permissions::{PermissionCheck, authorize};
use crate::projects::Projects;

use super::{Resolver, ResolverCommand, ResolverRejection, ResolverValue, Resolvers};

type Result<T> = std::result::Result<T, CommandError<ResolverRejection>>;

/// Orders resolvers the way resolution tries them: by priority, then id.
pub(crate) fn by_priority(a: &Resolver, b: &Resolver) -> std::cmp::Ordering {
    a.value
        .priority()
        .cmp(&b.value.priority())
        .then_with(|| a.id.cmp(&b.id))
}

/// Service for managing resolvers.
///
/// Priorities are unique among the active resolvers of a project. The check
/// reads the resolver cache, so the cache must have been rebuilt from the log
/// at startup.
pub struct ResolverService<L> {
    coordinator: Arc<WriteCoordinator<L, Resolvers>>,
    projects: Arc<WriteCoordinator<L, Projects>>,
    permissions: Arc<dyn PermissionCheck>,
}

impl<L> Clone for ResolverService<L> {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
            projects: self.projects.clone(),
            permissions: self.permissions.clone(),
        }
    }
}

impl<L: EventLog> ResolverService<L> {
    pub fn new(
        coordinator: Arc<WriteCoordinator<L, Resolvers>>,
        projects: Arc<WriteCoordinator<L, Projects>>,
        permissions: Arc<dyn PermissionCheck>,
    ) -> Self {
        Self {
            coordinator,
            projects,
            permissions,
        }
    }

    pub fn coordinator(&self) -> &Arc<WriteCoordinator<L, Resolvers>> {
        &self.coordinator
    }

    #[tracing::instrument(skip(self, value, caller), fields(subject = %caller.subject))]
    pub async fn create(
        &self,
        project: &ProjectRef,
        id: Iri,
        value: ResolverValue,
        caller: &Caller,
    ) -> Result<Committed<Resolver>> {
        self.checkpoints(project, &id, &value, caller).await?;
        self.coordinator
            .submit(Command::new(
                AggregateKey::resolver(project, &id),
                ExpectedRevision::Any,
                caller.subject.clone(),
                ResolverCommand::Create {
                    id,
                    project: project.clone(),
                    value,
                },
            ))
            .await
    }

    #[tracing::instrument(skip(self, value, caller), fields(subject = %caller.subject))]
    pub async fn update(
        &self,
        project: &ProjectRef,
        id: &Iri,
        rev: Revision,
        value: ResolverValue,
        caller: &Caller,
    ) -> Result<Committed<Resolver>> {
        self.checkpoints(project, id, &value, caller).await?;
        self.coordinator
            .submit(Command::new(
                AggregateKey::resolver(project, id),
                ExpectedRevision::Exact(rev),
                caller.subject.clone(),
                ResolverCommand::Update { value },
            ))
            .await
    }

    #[tracing::instrument(skip(self, caller), fields(subject = %caller.subject))]
    pub async fn deprecate(
        &self,
        project: &ProjectRef,
        id: &Iri,
        rev: Revision,
        caller: &Caller,
    ) -> Result<Committed<Resolver>> {
        authorize(
            self.permissions.as_ref(),
            caller,
            &Scope::Project(project.clone()),
            resolvers::write(),
        )
        .await?;
        self.ensure_project_active(project).await?;
        self.coordinator
            .submit(Command::new(
                AggregateKey::resolver(project, id),
                ExpectedRevision::Exact(rev),
                caller.subject.clone(),
                ResolverCommand::Deprecate,
            ))
            .await
    }

    async fn checkpoints(
        &self,
        project: &ProjectRef,
        id: &Iri,
        value: &ResolverValue,
        caller: &Caller,
    ) -> Result<()> {
        authorize(
            self.permissions.as_ref(),
            caller,
            &Scope::Project(project.clone()),
            resolvers::write(),
        )
        .await?;
        self.ensure_project_active(project).await?;

        let priority = value.priority();
        if let Some(other) = self
            .active(project)
            .await
            .into_iter()
            .find(|r| &r.id != id && r.value.priority() == priority)
        {
            return Err(CommandError::Rejected(
                ResolverRejection::PriorityAlreadyExists {
                    project: project.clone(),
                    id: other.id,
                    priority,
                },
            ));
        }
        Ok(())
    }

    async fn ensure_project_active(&self, project: &ProjectRef) -> Result<()> {
        match self.projects.lookup(&AggregateKey::project(project)).await? {
            None => Err(CommandError::Rejected(ResolverRejection::ProjectNotFound(
                project.clone(),
            ))),
            Some(p) if p.deprecated => Err(CommandError::Rejected(
                ResolverRejection::ProjectIsDeprecated(project.clone()),
            )),
            Some(_) => Ok(()),
        }
    }

    pub async fn fetch(
        &self,
        project: &ProjectRef,
        id: &Iri,
    ) -> std::result::Result<Resolver, FetchError> {
        self.coordinator
            .fetch(&AggregateKey::resolver(project, id))
            .await
    }

    pub async fn fetch_at(
        &self,
        project: &ProjectRef,
        id: &Iri,
        rev: Revision,
    ) -> std::result::Result<Resolver, FetchError> {
        self.coordinator
            .fetch_at(&AggregateKey::resolver(project, id), rev)
            .await
    }

    /// Active resolvers of a project, in resolution order.
    pub async fn active(&self, project: &ProjectRef) -> Vec<Resolver> {
        self.coordinator
            .cache()
            .list(
                Pagination::all(),
                |r| &r.project == project && !r.deprecated,
                by_priority,
            )
            .await
            .results
    }

    pub async fn list(
        &self,
        project: &ProjectRef,
        pagination: Pagination,
        include_deprecated: bool,
    ) -> Page<Resolver> {
        self.coordinator
            .cache()
            .list(
                pagination,
                |r| &r.project == project && (include_deprecated || !r.deprecated),
                by_priority,
            )
            .await
    }
}
