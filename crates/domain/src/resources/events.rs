//! Resource domain events.

use std::collections::BTreeSet;

use common::{Iri, ProjectRef};
use event_store::Revision;
use serde::{Deserialize, Serialize};

use crate::entity::DomainEvent;

/// Events that can occur on a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ResourceEvent {
    ResourceCreated(ResourceCreatedData),

    ResourceUpdated(ResourceUpdatedData),

    /// A tag now points at `target`.
    ResourceTagAdded { tag: String, target: Revision },

    ResourceTagDeleted { tag: String },

    ResourceDeprecated,
}

impl DomainEvent for ResourceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ResourceEvent::ResourceCreated(_) => "ResourceCreated",
            ResourceEvent::ResourceUpdated(_) => "ResourceUpdated",
            ResourceEvent::ResourceTagAdded { .. } => "ResourceTagAdded",
            ResourceEvent::ResourceTagDeleted { .. } => "ResourceTagDeleted",
            ResourceEvent::ResourceDeprecated => "ResourceDeprecated",
        }
    }
}

/// Data for ResourceCreated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceCreatedData {
    pub id: Iri,
    pub project: ProjectRef,
    pub types: BTreeSet<Iri>,
    pub source: serde_json::Value,
}

/// Data for ResourceUpdated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceUpdatedData {
    pub types: BTreeSet<Iri>,
    pub source: serde_json::Value,
}
