//! Authorization checkpoint.

use async_trait::async_trait;
use common::{Caller, Permission, Scope};
use event_store::Result;

/// Decides whether a caller holds a permission on an address.
///
/// Only the checkpoint is modeled here; the policy behind it is up to the
/// implementation.
#[async_trait]
pub trait PermissionCheck: Send + Sync {
    async fn has_permission(
        &self,
        caller: &Caller,
        address: &Scope,
        permission: &Permission,
    ) -> Result<bool>;
}

/// Grants everything. Used for bootstrap and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl PermissionCheck for AllowAll {
    async fn has_permission(&self, _: &Caller, _: &Scope, _: &Permission) -> Result<bool> {
        Ok(true)
    }
}

/// Fails with `Unauthorized` unless `caller` holds `permission` on `address`.
pub(crate) async fn authorize<R>(
    check: &dyn PermissionCheck,
    caller: &Caller,
    address: &Scope,
    permission: Permission,
) -> std::result::Result<(), crate::CommandError<R>> {
    if check.has_permission(caller, address, &permission).await? {
        Ok(())
    } else {
        tracing::debug!(subject = %caller.subject, %address, %permission, "permission denied");
        Err(crate::CommandError::Unauthorized {
            permission,
            address: address.clone(),
        })
    }
}
