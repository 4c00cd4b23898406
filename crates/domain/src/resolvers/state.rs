use chrono::{DateTime, Utc};
use common::{AggregateKey, Iri, ProjectRef, Subject};
use event_store::Revision;
use serde::{Deserialize, Serialize};

use crate::entity::{EntityState, EventMeta};

use super::ResolverValue;

/// Current state of a resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolver {
    pub id: Iri,
    pub project: ProjectRef,
    pub value: ResolverValue,
    pub revision: Revision,
    pub deprecated: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: Subject,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Subject,
}

impl Resolver {
    pub(super) fn created(id: &Iri, project: &ProjectRef, value: &ResolverValue, meta: &EventMeta) -> Self {
        Self {
            id: id.clone(),
            project: project.clone(),
            value: value.clone(),
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
}

impl EntityState for Resolver {
    fn key(&self) -> AggregateKey {
        AggregateKey::resolver(&self.project, &self.id)
    }

    fn revision(&self) -> Revision {
        self.revision
    }

    fn deprecated(&self) -> bool {
        self.deprecated
    }
}
