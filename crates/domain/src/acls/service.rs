//! ACL service.

use std::sync::Arc;

use common::{AggregateKey, Caller, Scope, Subject, permission::acls};
use event_store::{EventLog, Revision};

use crate::coordinator::{Command, Committed, ExpectedRevision, WriteCoordinator};
use crate::error::{CommandError, FetchError};
use crate::permissions::{PermissionCheck, authorize};

use super::{Acl, AclCommand, AclRejection, AclState, Acls};

type Result<T> = std::result::Result<T, CommandError<AclRejection>>;

/// Service for managing ACLs. Every command expects an exact revision; a new
/// ACL is at revision 0.
pub struct AclService<L> {
    coordinator: Arc<WriteCoordinator<L, Acls>>,
    permissions: Arc<dyn PermissionCheck>,
}

impl<L> Clone for AclService<L> {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
            permissions: self.permissions.clone(),
        }
    }
}

impl<L: EventLog> AclService<L> {
    pub fn new(
        coordinator: Arc<WriteCoordinator<L, Acls>>,
        permissions: Arc<dyn PermissionCheck>,
    ) -> Self {
        Self {
            coordinator,
            permissions,
        }
    }

    pub fn coordinator(&self) -> &Arc<WriteCoordinator<L, Acls>> {
        &self.coordinator
    }

    #[tracing::instrument(skip(self, acl, caller), fields(subject = %caller.subject))]
    pub async fn replace(
        &self,
        address: &Scope,
        rev: Revision,
        acl: Acl,
        caller: &Caller,
    ) -> Result<Committed<AclState>> {
        self.submit(address, rev, AclCommand::Replace { acl }, caller)
            .await
    }

    #[tracing::instrument(skip(self, acl, caller), fields(subject = %caller.subject))]
    pub async fn append(
        &self,
        address: &Scope,
        rev: Revision,
        acl: Acl,
        caller: &Caller,
    ) -> Result<Committed<AclState>> {
        self.submit(address, rev, AclCommand::Append { acl }, caller)
            .await
    }

    #[tracing::instrument(skip(self, acl, caller), fields(subject = %caller.subject))]
    pub async fn subtract(
        &self,
        address: &Scope,
        rev: Revision,
        acl: Acl,
        caller: &Caller,
    ) -> Result<Committed<AclState>> {
        self.submit(address, rev, AclCommand::Subtract { acl }, caller)
            .await
    }

    #[tracing::instrument(skip(self, caller), fields(subject = %caller.subject))]
    pub async fn delete(
        &self,
        address: &Scope,
        rev: Revision,
        caller: &Caller,
    ) -> Result<Committed<AclState>> {
        self.submit(address, rev, AclCommand::Delete, caller).await
    }

    /// Writes `acl` at `address` unless an ACL already exists there, without
    /// a permission check. Used to seed the root ACL at startup; returns
    /// whether anything was written.
    #[tracing::instrument(skip(self, acl))]
    pub async fn provision(&self, address: &Scope, acl: Acl, subject: Subject) -> Result<bool> {
        let result = self
            .coordinator
            .submit(Command::new(
                AggregateKey::acl(address),
                ExpectedRevision::new_aggregate(),
                subject,
                AclCommand::Replace { acl },
            ))
            .await;
        match result {
            Ok(_) => {
                tracing::info!(%address, "ACL provisioned");
                Ok(true)
            }
            Err(CommandError::IncorrectRevision { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn submit(
        &self,
        address: &Scope,
        rev: Revision,
        command: AclCommand,
        caller: &Caller,
    ) -> Result<Committed<AclState>> {
        authorize(self.permissions.as_ref(), caller, address, acls::write()).await?;
        self.coordinator
            .submit(Command::new(
                AggregateKey::acl(address),
                ExpectedRevision::Exact(rev),
                caller.subject.clone(),
                command,
            ))
            .await
    }

    pub async fn fetch(&self, address: &Scope) -> std::result::Result<AclState, FetchError> {
        self.coordinator.fetch(&AggregateKey::acl(address)).await
    }

    pub async fn fetch_at(
        &self,
        address: &Scope,
        rev: Revision,
    ) -> std::result::Result<AclState, FetchError> {
        self.coordinator
            .fetch_at(&AggregateKey::acl(address), rev)
            .await
    }
}
