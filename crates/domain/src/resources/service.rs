//! Resource service.

use std::collections::BTreeSet;
use std::sync::Arc;

use common::{AggregateKey, Caller, EntityType, Iri, ProjectRef, Scope, permission::resources};
use event_store::{EventLog, Revision};

use crate::cache::{Page, Pagination, by_key};
use crate::coordinator::{Command, Committed, ExpectedRevision, WriteCoordinator};
use crate::error::{CommandError, FetchError};
use crate::permissions::{PermissionCheck, authorize};
use crate::projects::Projects;
use crate::quotas::QuotaCheck;

use super::{Resource, ResourceCommand, ResourceRef, ResourceRejection, Resources};

type Result<T> = std::result::Result<T, CommandError<ResourceRejection>>;

/// Service for managing resources within projects.
pub struct ResourceService<L> {
    coordinator: Arc<WriteCoordinator<L, Resources>>,
    projects: Arc<WriteCoordinator<L, Projects>>,
    permissions: Arc<dyn PermissionCheck>,
    quotas: Arc<dyn QuotaCheck>,
}

impl<L> Clone for ResourceService<L> {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
            projects: self.projects.clone(),
            permissions: self.permissions.clone(),
            quotas: self.quotas.clone(),
        }
    }
}

impl<L: EventLog> ResourceService<L> {
    pub fn new(
        coordinator: Arc<WriteCoordinator<L, Resources>>,
        projects: Arc<WriteCoordinator<L, Projects>>,
        permissions: Arc<dyn PermissionCheck>,
        quotas: Arc<dyn QuotaCheck>,
    ) -> Self {
        Self {
            coordinator,
            projects,
            permissions,
            quotas,
        }
    }

    pub fn coordinator(&self) -> &Arc<WriteCoordinator<L, Resources>> {
        &self.coordinator
    }

    #[tracing::instrument(skip(self, types, source, caller), fields(subject = %caller.subject))]
    pub async fn create(
        &self,
        project: &ProjectRef,
        id: Iri,
        types: BTreeSet<Iri>,
        source: serde_json::Value,
        caller: &Caller,
    ) -> Result<Committed<Resource>> {
        let address = Scope::Project(project.clone());
        authorize(self.permissions.as_ref(), caller, &address, resources::write()).await?;
        self.ensure_project_active(project).await?;

        if self
            .quotas
            .quota_reached(&address, EntityType::Resource)
            .await?
        {
            return Err(CommandError::QuotaReached {
                scope: address,
                entity_type: EntityType::Resource,
            });
        }

        self.coordinator
            .submit(Command::new(
                AggregateKey::resource(project, &id),
                ExpectedRevision::Any,
                caller.subject.clone(),
                ResourceCommand::Create {
                    id,
                    project: project.clone(),
                    types,
                    source,
                },
            ))
            .await
    }

    #[tracing::instrument(skip(self, types, source, caller), fields(subject = %caller.subject))]
    pub async fn update(
        &self,
        project: &ProjectRef,
        id: &Iri,
        rev: Revision,
        types: BTreeSet<Iri>,
        source: serde_json::Value,
        caller: &Caller,
    ) -> Result<Committed<Resource>> {
        self.submit(project, id, rev, ResourceCommand::Update { types, source }, caller)
            .await
    }

    /// Points `tag` at `target`, which must be an existing revision.
    #[tracing::instrument(skip(self, caller), fields(subject = %caller.subject))]
    pub async fn tag(
        &self,
        project: &ProjectRef,
        id: &Iri,
        rev: Revision,
        tag: String,
        target: Revision,
        caller: &Caller,
    ) -> Result<Committed<Resource>> {
        self.submit(project, id, rev, ResourceCommand::Tag { tag, target }, caller)
            .await
    }

    #[tracing::instrument(skip(self, caller), fields(subject = %caller.subject))]
    pub async fn delete_tag(
        &self,
        project: &ProjectRef,
        id: &Iri,
        rev: Revision,
        tag: String,
        caller: &Caller,
    ) -> Result<Committed<Resource>> {
        self.submit(project, id, rev, ResourceCommand::DeleteTag { tag }, caller)
            .await
    }

    #[tracing::instrument(skip(self, caller), fields(subject = %caller.subject))]
    pub async fn deprecate(
        &self,
        project: &ProjectRef,
        id: &Iri,
        rev: Revision,
        caller: &Caller,
    ) -> Result<Committed<Resource>> {
        self.submit(project, id, rev, ResourceCommand::Deprecate, caller)
            .await
    }

    async fn submit(
        &self,
        project: &ProjectRef,
        id: &Iri,
        rev: Revision,
        command: ResourceCommand,
        caller: &Caller,
    ) -> Result<Committed<Resource>> {
        let address = Scope::Project(project.clone());
        authorize(self.permissions.as_ref(), caller, &address, resources::write()).await?;
        self.ensure_project_active(project).await?;

        self.coordinator
            .submit(Command::new(
                AggregateKey::resource(project, id),
                ExpectedRevision::Exact(rev),
                caller.subject.clone(),
                command,
            ))
            .await
    }

    async fn ensure_project_active(&self, project: &ProjectRef) -> Result<()> {
        match self.projects.lookup(&AggregateKey::project(project)).await? {
            None => Err(CommandError::Rejected(ResourceRejection::ProjectNotFound(
                project.clone(),
            ))),
            Some(p) if p.deprecated => Err(CommandError::Rejected(
                ResourceRejection::ProjectIsDeprecated(project.clone()),
            )),
            Some(_) => Ok(()),
        }
    }

    pub async fn fetch(
        &self,
        project: &ProjectRef,
        id: &Iri,
    ) -> std::result::Result<Resource, FetchError> {
        self.coordinator
            .fetch(&AggregateKey::resource(project, id))
            .await
    }

    pub async fn fetch_at(
        &self,
        project: &ProjectRef,
        id: &Iri,
        rev: Revision,
    ) -> std::result::Result<Resource, FetchError> {
        self.coordinator
            .fetch_at(&AggregateKey::resource(project, id), rev)
            .await
    }

    /// State at the revision `tag` currently points at.
    pub async fn fetch_by_tag(
        &self,
        project: &ProjectRef,
        id: &Iri,
        tag: &str,
    ) -> std::result::Result<Resource, FetchError> {
        let key = AggregateKey::resource(project, id);
        let latest = self.coordinator.fetch(&key).await?;
        let rev = latest.tagged(tag).ok_or_else(|| FetchError::TagNotFound {
            key: key.clone(),
            tag: tag.to_string(),
        })?;
        self.coordinator.fetch_at(&key, rev).await
    }

    pub async fn fetch_ref(
        &self,
        project: &ProjectRef,
        reference: &ResourceRef,
    ) -> std::result::Result<Resource, FetchError> {
        match reference {
            ResourceRef::Latest { id } => self.fetch(project, id).await,
            ResourceRef::Revision { id, rev } => self.fetch_at(project, id, *rev).await,
            ResourceRef::Tag { id, tag } => self.fetch_by_tag(project, id, tag).await,
        }
    }

    /// Lists the cached resources of a project. When `types` is not empty,
    /// only resources with at least one of them are returned.
    pub async fn list(
        &self,
        project: &ProjectRef,
        types: &BTreeSet<Iri>,
        pagination: Pagination,
        include_deprecated: bool,
    ) -> Page<Resource> {
        self.coordinator
            .cache()
            .list(
                pagination,
                |r| {
                    &r.project == project
                        && (include_deprecated || !r.deprecated)
                        && (types.is_empty() || r.has_any_type(types))
                },
                by_key,
            )
            .await
    }
}
