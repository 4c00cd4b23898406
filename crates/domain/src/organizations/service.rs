//! Organization service.

use std::sync::Arc;

use common::{AggregateKey, Caller, Label, Scope, permission::orgs};
use event_store::{EventLog, Revision};

use crate::cache::{Page, Pagination, by_key};
use crate::coordinator::{Command, Committed, ExpectedRevision, WriteCoordinator};
use crate::error::{CommandError, FetchError};
use crate::permissions::{PermissionCheck, authorize};

use super::{Organization, OrganizationCommand, OrganizationRejection, Organizations};

type Result<T> = std::result::Result<T, CommandError<OrganizationRejection>>;

/// Service for managing organizations.
pub struct OrganizationService<L> {
    coordinator: Arc<WriteCoordinator<L, Organizations>>,
    permissions: Arc<dyn PermissionCheck>,
}

impl<L> Clone for OrganizationService<L> {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
            permissions: self.permissions.clone(),
        }
    }
}

impl<L: EventLog> OrganizationService<L> {
    pub fn new(
        coordinator: Arc<WriteCoordinator<L, Organizations>>,
        permissions: Arc<dyn PermissionCheck>,
    ) -> Self {
        Self {
            coordinator,
            permissions,
        }
    }

    pub fn coordinator(&self) -> &Arc<WriteCoordinator<L, Organizations>> {
        &self.coordinator
    }

    #[tracing::instrument(skip(self, caller), fields(subject = %caller.subject))]
    pub async fn create(
        &self,
        label: Label,
        description: Option<String>,
        caller: &Caller,
    ) -> Result<Committed<Organization>> {
        authorize(self.permissions.as_ref(), caller, &Scope::Root, orgs::create()).await?;

        let key = AggregateKey::organization(&label);
        self.coordinator
            .submit(Command::new(
                key,
                ExpectedRevision::Any,
                caller.subject.clone(),
                OrganizationCommand::Create { label, description },
            ))
            .await
    }

    #[tracing::instrument(skip(self, caller), fields(subject = %caller.subject))]
    pub async fn update(
        &self,
        label: &Label,
        rev: Revision,
        description: Option<String>,
        caller: &Caller,
    ) -> Result<Committed<Organization>> {
        self.submit(label, rev, OrganizationCommand::Update { description }, caller)
            .await
    }

    #[tracing::instrument(skip(self, caller), fields(subject = %caller.subject))]
    pub async fn deprecate(
        &self,
        label: &Label,
        rev: Revision,
        caller: &Caller,
    ) -> Result<Committed<Organization>> {
        self.submit(label, rev, OrganizationCommand::Deprecate, caller)
            .await
    }

    async fn submit(
        &self,
        label: &Label,
        rev: Revision,
        command: OrganizationCommand,
        caller: &Caller,
    ) -> Result<Committed<Organization>> {
        let address = Scope::Organization(label.clone());
        authorize(self.permissions.as_ref(), caller, &address, orgs::write()).await?;

        self.coordinator
            .submit(Command::new(
                AggregateKey::organization(label),
                ExpectedRevision::Exact(rev),
                caller.subject.clone(),
                command,
            ))
            .await
    }

    pub async fn fetch(&self, label: &Label) -> std::result::Result<Organization, FetchError> {
        self.coordinator
            .fetch(&AggregateKey::organization(label))
            .await
    }

    pub async fn fetch_at(
        &self,
        label: &Label,
        rev: Revision,
    ) -> std::result::Result<Organization, FetchError> {
        self.coordinator
            .fetch_at(&AggregateKey::organization(label), rev)
            .await
    }

    /// Lists cached organizations ordered by label.
    pub async fn list(&self, pagination: Pagination, include_deprecated: bool) -> Page<Organization> {
        self.coordinator
            .cache()
            .list(
                pagination,
                |org| include_deprecated || !org.deprecated,
                by_key,
            )
            .await
    }
}
