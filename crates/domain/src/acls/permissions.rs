use std::sync::Arc;

use async_trait::async_trait;
use common::{AggregateKey, Caller, Permission, Scope};
use event_store::{EventLog, Result};

use crate::coordinator::WriteCoordinator;
use crate::permissions::PermissionCheck;

use super::Acls;

/// Grants a permission on an address when the ACL at that address or at any
/// of its ancestors grants it to one of the caller's identities.
pub struct AclPermissions<L> {
    acls: Arc<WriteCoordinator<L, Acls>>,
}

impl<L> AclPermissions<L> {
    pub fn new(acls: Arc<WriteCoordinator<L, Acls>>) -> Self {
        Self { acls }
    }
}

#[async_trait]
impl<L: EventLog> PermissionCheck for AclPermissions<L> {
    async fn has_permission(
        &self,
        caller: &Caller,
        address: &Scope,
        permission: &Permission,
    ) -> Result<bool> {
        for scope in address.ancestry() {
            if let Some(state) = self.acls.lookup(&AggregateKey::acl(&scope)).await?
                && state.acl.has_permission(&caller.identities, permission)
            {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
