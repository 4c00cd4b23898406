//! Project service.

use std::sync::Arc;

use common::{AggregateKey, Caller, EntityType, Label, ProjectRef, Scope, permission::projects};
use event_store::{EventLog, Revision};

use crate::cache::{Page, Pagination, by_key};
use crate::coordinator::{Command, Committed, ExpectedRevision, WriteCoordinator};
use crate::error::{CommandError, FetchError};
use crate::organizations::Organizations;
use crate::permissions::{PermissionCheck, authorize};
use crate::quotas::QuotaCheck;

use super::{Project, ProjectCommand, ProjectFields, ProjectRejection, Projects};

type Result<T> = std::result::Result<T, CommandError<ProjectRejection>>;

/// Service for managing projects.
///
/// Before submitting, it verifies that the owning organization exists and is
/// not deprecated, and that the organization's project quota allows a new
/// project.
pub struct ProjectService<L> {
    coordinator: Arc<WriteCoordinator<L, Projects>>,
    organizations: Arc<WriteCoordinator<L, Organizations>>,
    permissions: Arc<dyn PermissionCheck>,
    quotas: Arc<dyn QuotaCheck>,
}

impl<L> Clone for ProjectService<L> {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
            organizations: self.organizations.clone(),
            permissions: self.permissions.clone(),
            quotas: self.quotas.clone(),
        }
    }
}

impl<L: EventLog> ProjectService<L> {
    pub fn new(
        coordinator: Arc<WriteCoordinator<L, Projects>>,
        organizations: Arc<WriteCoordinator<L, Organizations>>,
        permissions: Arc<dyn PermissionCheck>,
        quotas: Arc<dyn QuotaCheck>,
    ) -> Self {
        Self {
            coordinator,
            organizations,
            permissions,
            quotas,
        }
    }

    pub fn coordinator(&self) -> &Arc<WriteCoordinator<L, Projects>> {
        &self.coordinator
    }

    #[tracing::instrument(skip(self, fields, caller), fields(subject = %caller.subject))]
    pub async fn create(
        &self,
        project: ProjectRef,
        fields: ProjectFields,
        caller: &Caller,
    ) -> Result<Committed<Project>> {
        let org_scope = Scope::Organization(project.organization.clone());
        authorize(self.permissions.as_ref(), caller, &org_scope, projects::create()).await?;
        self.ensure_organization_active(&project.organization).await?;

        if self
            .quotas
            .quota_reached(&org_scope, EntityType::Project)
            .await?
        {
            return Err(CommandError::QuotaReached {
                scope: org_scope,
                entity_type: EntityType::Project,
            });
        }

        self.coordinator
            .submit(Command::new(
                AggregateKey::project(&project),
                ExpectedRevision::Any,
                caller.subject.clone(),
                ProjectCommand::Create { project, fields },
            ))
            .await
    }

    #[tracing::instrument(skip(self, fields, caller), fields(subject = %caller.subject))]
    pub async fn update(
        &self,
        project: &ProjectRef,
        rev: Revision,
        fields: ProjectFields,
        caller: &Caller,
    ) -> Result<Committed<Project>> {
        self.submit(project, rev, ProjectCommand::Update { fields }, caller)
            .await
    }

    #[tracing::instrument(skip(self, caller), fields(subject = %caller.subject))]
    pub async fn deprecate(
        &self,
        project: &ProjectRef,
        rev: Revision,
        caller: &Caller,
    ) -> Result<Committed<Project>> {
        self.submit(project, rev, ProjectCommand::Deprecate, caller)
            .await
    }

    async fn submit(
        &self,
        project: &ProjectRef,
        rev: Revision,
        command: ProjectCommand,
        caller: &Caller,
    ) -> Result<Committed<Project>> {
        let address = Scope::Project(project.clone());
        authorize(self.permissions.as_ref(), caller, &address, projects::write()).await?;
        self.ensure_organization_active(&project.organization).await?;

        self.coordinator
            .submit(Command::new(
                AggregateKey::project(project),
                ExpectedRevision::Exact(rev),
                caller.subject.clone(),
                command,
            ))
            .await
    }

    async fn ensure_organization_active(&self, label: &Label) -> Result<()> {
        match self
            .organizations
            .lookup(&AggregateKey::organization(label))
            .await?
        {
            None => Err(CommandError::Rejected(
                ProjectRejection::OrganizationNotFound(label.clone()),
            )),
            Some(org) if org.deprecated => Err(CommandError::Rejected(
                ProjectRejection::OrganizationIsDeprecated(label.clone()),
            )),
            Some(_) => Ok(()),
        }
    }

    pub async fn fetch(&self, project: &ProjectRef) -> std::result::Result<Project, FetchError> {
        self.coordinator.fetch(&AggregateKey::project(project)).await
    }

    pub async fn fetch_at(
        &self,
        project: &ProjectRef,
        rev: Revision,
    ) -> std::result::Result<Project, FetchError> {
        self.coordinator
            .fetch_at(&AggregateKey::project(project), rev)
            .await
    }

    /// Lists the cached projects of an organization, or of all organizations.
    pub async fn list(
        &self,
        organization: Option<&Label>,
        pagination: Pagination,
        include_deprecated: bool,
    ) -> Page<Project> {
        self.coordinator
            .cache()
            .list(
                pagination,
                |p| {
                    (include_deprecated || !p.deprecated)
                        && organization.is_none_or(|org| &p.project.organization == org)
                },
                by_key,
            )
            .await
    }
}
