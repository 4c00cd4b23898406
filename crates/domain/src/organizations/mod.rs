//! Organizations: the top-level tenants.

mod service;

pub use service::OrganizationService;

use chrono::{DateTime, Utc};
use common::{AggregateKey, EntityType, Label, Subject};
use event_store::Revision;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::{DomainEvent, Entity, EntityState, EventMeta};

/// Rejections of organization commands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrganizationRejection {
    #[error("Organization '{0}' already exists")]
    AlreadyExists(Label),

    #[error("Organization '{0}' was not found")]
    NotFound(AggregateKey),

    #[error("Organization '{0}' is deprecated")]
    IsDeprecated(Label),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrganizationCommand {
    Create {
        label: Label,
        description: Option<String>,
    },
    Update {
        description: Option<String>,
    },
    Deprecate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrganizationEvent {
    OrganizationCreated {
        label: Label,
        description: Option<String>,
    },
    OrganizationUpdated {
        description: Option<String>,
    },
    OrganizationDeprecated,
}

impl DomainEvent for OrganizationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrganizationEvent::OrganizationCreated { .. } => "OrganizationCreated",
            OrganizationEvent::OrganizationUpdated { .. } => "OrganizationUpdated",
            OrganizationEvent::OrganizationDeprecated => "OrganizationDeprecated",
        }
    }
}

/// Current state of an organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub label: Label,
    pub description: Option<String>,
    pub revision: Revision,
    pub deprecated: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: Subject,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Subject,
}

impl EntityState for Organization {
    fn key(&self) -> AggregateKey {
        AggregateKey::organization(&self.label)
    }

    fn revision(&self) -> Revision {
        self.revision
    }

    fn deprecated(&self) -> bool {
        self.deprecated
    }
}

/// The organization entity.
pub struct Organizations;

impl Entity for Organizations {
    const ENTITY_TYPE: EntityType = EntityType::Organization;

    type State = Organization;
    type Command = OrganizationCommand;
    type Event = OrganizationEvent;
    type Rejection = OrganizationRejection;

    fn evaluate(
        key: &AggregateKey,
        state: Option<&Organization>,
        command: &OrganizationCommand,
    ) -> Result<OrganizationEvent, OrganizationRejection> {
        use OrganizationCommand as C;
        use OrganizationRejection as R;

        match (state, command) {
            (None, C::Create { label, description }) => Ok(OrganizationEvent::OrganizationCreated {
                label: label.clone(),
                description: description.clone(),
            }),
            (Some(_), C::Create { label, .. }) => Err(R::AlreadyExists(label.clone())),
            (None, _) => Err(R::NotFound(key.clone())),
            (Some(org), _) if org.deprecated => Err(R::IsDeprecated(org.label.clone())),
            (Some(_), C::Update { description }) => Ok(OrganizationEvent::OrganizationUpdated {
                description: description.clone(),
            }),
            (Some(_), C::Deprecate) => Ok(OrganizationEvent::OrganizationDeprecated),
        }
    }

    fn next(
        state: Option<Organization>,
        event: &OrganizationEvent,
        meta: &EventMeta,
    ) -> Option<Organization> {
        match (state, event) {
            (None, OrganizationEvent::OrganizationCreated { label, description }) => {
                Some(Organization {
                    label: label.clone(),
                    description: description.clone(),
                    revision: meta.revision,
                    deprecated: false,
                    created_at: meta.instant,
                    created_by: meta.subject.clone(),
                    updated_at: meta.instant,
                    updated_by: meta.subject.clone(),
                })
            }
            (Some(org), OrganizationEvent::OrganizationUpdated { description }) => {
                Some(Organization {
                    description: description.clone(),
                    revision: meta.revision,
                    updated_at: meta.instant,
                    updated_by: meta.subject.clone(),
                    ..org
                })
            }
            (Some(org), OrganizationEvent::OrganizationDeprecated) => Some(Organization {
                deprecated: true,
                revision: meta.revision,
                updated_at: meta.instant,
                updated_by: meta.subject.clone(),
                ..org
            }),
            _ => None,
        }
    }
}
