//! Resolver domain events.

use common::{Iri, ProjectRef};
use serde::{Deserialize, Serialize};

use crate::entity::DomainEvent;

use super::ResolverValue;

/// Events that can occur on a resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ResolverEvent {
    ResolverCreated {
        id: Iri,
        project: ProjectRef,
        value: ResolverValue,
    },

    ResolverUpdated { value: ResolverValue },

    ResolverDeprecated,
}

impl DomainEvent for ResolverEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ResolverEvent::ResolverCreated { .. } => "ResolverCreated",
            ResolverEvent::ResolverUpdated { .. } => "ResolverUpdated",
            ResolverEvent::ResolverDeprecated => "ResolverDeprecated",
        }
    }
}
