use std::collections::BTreeSet;

use common::{Caller, Identity, Iri, ProjectRef};
use serde::{Deserialize, Serialize};

/// Rank of a resolver within its project; lower values are tried first.
pub type Priority = u32;

/// Which identities a cross-project resolver uses to read target projects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum IdentityResolution {
    /// The identities of whoever is resolving.
    UseCurrentCaller,
    /// A fixed identity set stored on the resolver.
    ProvidedIdentities { identities: BTreeSet<Identity> },
}

impl IdentityResolution {
    /// The caller used for permission checks on the target projects.
    pub fn effective_caller(&self, caller: &Caller) -> Caller {
        match self {
            IdentityResolution::UseCurrentCaller => caller.clone(),
            IdentityResolution::ProvidedIdentities { identities } => {
                Caller::new(caller.subject.clone(), identities.clone())
            }
        }
    }
}

/// Configuration of a resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "@type", rename_all_fields = "camelCase")]
pub enum ResolverValue {
    /// Looks references up in the resolver's own project.
    InProject { priority: Priority },

    /// Looks references up in other projects, in the given order.
    CrossProject {
        priority: Priority,
        projects: Vec<ProjectRef>,
        /// Allowed resource types; empty allows every type.
        resource_types: BTreeSet<Iri>,
        identities: IdentityResolution,
    },
}

impl ResolverValue {
    pub fn priority(&self) -> Priority {
        match self {
            ResolverValue::InProject { priority } | ResolverValue::CrossProject { priority, .. } => {
                *priority
            }
        }
    }

    /// Name of the variant, used in rejections.
    pub fn kind(&self) -> &'static str {
        match self {
            ResolverValue::InProject { .. } => "InProject",
            ResolverValue::CrossProject { .. } => "CrossProject",
        }
    }

    pub fn is_in_project(&self) -> bool {
        matches!(self, ResolverValue::InProject { .. })
    }
}
