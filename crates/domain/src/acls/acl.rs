use std::collections::{BTreeMap, BTreeSet};

use common::{Identity, Permission};
use serde::{Deserialize, Serialize};

/// One identity and the permissions granted to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
    pub identity: Identity,
    pub permissions: BTreeSet<Permission>,
}

/// Permissions granted per identity at one address.
///
/// Identities never map to an empty permission set; operations drop such
/// entries. Serialized as a list of entries since identities are not strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<AclEntry>", into = "Vec<AclEntry>")]
pub struct Acl {
    grants: BTreeMap<Identity, BTreeSet<Permission>>,
}

impl Acl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants `permissions` to `identity`, on top of what it already has.
    pub fn grant(
        mut self,
        identity: Identity,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> Self {
        let entry = self.grants.entry(identity).or_default();
        entry.extend(permissions);
        if entry.is_empty() {
            self.grants.retain(|_, p| !p.is_empty());
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&Identity, &BTreeSet<Permission>)> {
        self.grants.iter()
    }

    /// Union of the permissions granted to any of `identities`.
    pub fn permissions_for<'a>(
        &self,
        identities: impl IntoIterator<Item = &'a Identity>,
    ) -> BTreeSet<Permission> {
        identities
            .into_iter()
            .filter_map(|identity| self.grants.get(identity))
            .flatten()
            .cloned()
            .collect()
    }

    pub fn has_permission<'a>(
        &self,
        identities: impl IntoIterator<Item = &'a Identity>,
        permission: &Permission,
    ) -> bool {
        identities
            .into_iter()
            .filter_map(|identity| self.grants.get(identity))
            .any(|permissions| permissions.contains(permission))
    }

    /// Both ACLs combined.
    pub fn merge(&self, other: &Acl) -> Acl {
        let mut merged = self.clone();
        for (identity, permissions) in &other.grants {
            merged
                .grants
                .entry(identity.clone())
                .or_default()
                .extend(permissions.iter().cloned());
        }
        merged
    }

    /// This ACL without the permissions granted in `other`.
    pub fn subtract(&self, other: &Acl) -> Acl {
        let mut remaining = self.clone();
        for (identity, permissions) in &other.grants {
            if let Some(current) = remaining.grants.get_mut(identity) {
                current.retain(|p| !permissions.contains(p));
            }
        }
        remaining.grants.retain(|_, p| !p.is_empty());
        remaining
    }
}

impl From<Vec<AclEntry>> for Acl {
    fn from(entries: Vec<AclEntry>) -> Self {
        entries
            .into_iter()
            .fold(Acl::new(), |acl, entry| acl.grant(entry.identity, entry.permissions))
    }
}

impl From<Acl> for Vec<AclEntry> {
    fn from(acl: Acl) -> Self {
        acl.grants
            .into_iter()
            .map(|(identity, permissions)| AclEntry {
                identity,
                permissions,
            })
            .collect()
    }
}
