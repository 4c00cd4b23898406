use chrono::{DateTime, Utc};
use common::{AggregateKey, Iri, ProjectRef, Subject};
use event_store::Revision;
use serde::{Deserialize, Serialize};

use crate::entity::{EntityState, EventMeta};

use super::ProjectFields;

/// Current state of a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub project: ProjectRef,
    pub description: Option<String>,
    pub base: Option<Iri>,
    pub vocab: Option<Iri>,
    pub revision: Revision,
    pub deprecated: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: Subject,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Subject,
}

impl Project {
    pub(super) fn created(project: ProjectRef, fields: ProjectFields, meta: &EventMeta) -> Self {
        Self {
            project,
            description: fields.description,
            base: fields.base,
            vocab: fields.vocab,
            revision: meta.revision,
            deprecated: false,
            created_at: meta.instant,
            created_by: meta.subject.clone(),
            updated_at: meta.instant,
            updated_by: meta.subject.clone(),
        }
    }

    /// Same state, stamped with the revision and author of a later event.
    pub(super) fn touched(self, meta: &EventMeta) -> Self {
        Self {
            revision: meta.revision,
            updated_at: meta.instant,
            updated_by: meta.subject.clone(),
            ..self
        }
    }
}

impl EntityState for Project {
    fn key(&self) -> AggregateKey {
        AggregateKey::project(&self.project)
    }

    fn revision(&self) -> Revision {
        self.revision
    }

    fn deprecated(&self) -> bool {
        self.deprecated
    }
}
