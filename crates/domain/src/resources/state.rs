use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use common::{AggregateKey, Iri, ProjectRef, Subject};
use event_store::Revision;
use serde::{Deserialize, Serialize};

use crate::entity::{EntityState, EventMeta};

use super::events::ResourceCreatedData;

/// Current state of a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: Iri,
    pub project: ProjectRef,
    pub types: BTreeSet<Iri>,
    pub source: serde_json::Value,
    /// Tag name to the revision it points at.
    pub tags: BTreeMap<String, Revision>,
    pub revision: Revision,
    pub deprecated: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: Subject,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Subject,
}

impl Resource {
    pub(super) fn created(data: &ResourceCreatedData, meta: &EventMeta) -> Self {
        Self {
            id: data.id.clone(),
            project: data.project.clone(),
            types: data.types.clone(),
            source: data.source.clone(),
            tags: BTreeMap::new(),
            revision: meta.revision,
            deprecated: false,
            created_at: meta.instant,
            created_by: meta.subject.clone(),
            updated_at: meta.instant,
            updated_by: meta.subject.clone(),
        }
    }

    pub(super) fn touched(self, meta: &EventMeta) -> Self {
        Self {
            revision: meta.revision,
            updated_at: meta.instant,
            updated_by: meta.subject.clone(),
            ..self
        }
    }

    /// Revision a tag points at.
    pub fn tagged(&self, tag: &str) -> Option<Revision> {
        self.tags.get(tag).copied()
    }

    pub fn has_any_type(&self, types: &BTreeSet<Iri>) -> bool {
        !self.types.is_disjoint(types)
    }
}

impl EntityState for Resource {
    fn key(&self) -> AggregateKey {
        AggregateKey::resource(&self.project, &self.id)
    }

    fn revision(&self) -> Revision {
        self.revision
    }

    fn deprecated(&self) -> bool {
        self.deprecated
    }
}
