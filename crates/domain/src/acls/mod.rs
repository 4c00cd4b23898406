//! Access control lists, one per address (root, organization or project).

mod acl;
mod permissions;
mod service;

pub use acl::{Acl, AclEntry};
pub use permissions::AclPermissions;
pub use service::AclService;

use chrono::{DateTime, Utc};
use common::{AggregateKey, EntityType, Scope, Subject};
use event_store::Revision;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::{DomainEvent, Entity, EntityState, EventMeta};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AclRejection {
    #[error("The ACL on '{0}' would not change")]
    NothingToBeUpdated(Scope),

    #[error("No ACL exists on '{0}'")]
    AclNotFound(Scope),

    #[error("The ACL on '{0}' is empty")]
    IsEmpty(Scope),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AclCommand {
    /// Overwrites the ACL.
    Replace { acl: Acl },
    /// Adds permissions.
    Append { acl: Acl },
    /// Removes permissions.
    Subtract { acl: Acl },
    /// Removes every permission.
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum AclEvent {
    AclReplaced { address: Scope, acl: Acl },
    AclAppended { address: Scope, acl: Acl },
    AclSubtracted { acl: Acl },
    AclDeleted,
}

impl DomainEvent for AclEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AclEvent::AclReplaced { .. } => "AclReplaced",
            AclEvent::AclAppended { .. } => "AclAppended",
            AclEvent::AclSubtracted { .. } => "AclSubtracted",
            AclEvent::AclDeleted => "AclDeleted",
        }
    }
}

/// The ACL at an address. Deleting it empties the ACL but keeps its history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AclState {
    pub address: Scope,
    pub acl: Acl,
    pub revision: Revision,
    pub created_at: DateTime<Utc>,
    pub created_by: Subject,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Subject,
}

impl EntityState for AclState {
    fn key(&self) -> AggregateKey {
        AggregateKey::acl(&self.address)
    }

    fn revision(&self) -> Revision {
        self.revision
    }

    fn deprecated(&self) -> bool {
        false
    }
}

pub struct Acls;

impl Entity for Acls {
    const ENTITY_TYPE: EntityType = EntityType::Acl;

    type State = AclState;
    type Command = AclCommand;
    type Event = AclEvent;
    type Rejection = AclRejection;

    fn evaluate(
        key: &AggregateKey,
        state: Option<&AclState>,
        command: &AclCommand,
    ) -> Result<AclEvent, AclRejection> {
        let address = key.scope().clone();
        let current = state.map(|s| &s.acl);

        match command {
            AclCommand::Replace { acl } if current == Some(acl) => {
                Err(AclRejection::NothingToBeUpdated(address))
            }
            AclCommand::Replace { acl } if current.is_none() && acl.is_empty() => {
                Err(AclRejection::NothingToBeUpdated(address))
            }
            AclCommand::Replace { acl } => Ok(AclEvent::AclReplaced {
                address,
                acl: acl.clone(),
            }),
            AclCommand::Append { acl } => {
                let unchanged = match current {
                    Some(current) => &current.merge(acl) == current,
                    None => acl.is_empty(),
                };
                if unchanged {
                    Err(AclRejection::NothingToBeUpdated(address))
                } else {
                    Ok(AclEvent::AclAppended {
                        address,
                        acl: acl.clone(),
                    })
                }
            }
            AclCommand::Subtract { acl } => match current {
                None => Err(AclRejection::AclNotFound(address)),
                Some(current) if current.is_empty() => Err(AclRejection::IsEmpty(address)),
                Some(current) if &current.subtract(acl) == current => {
                    Err(AclRejection::NothingToBeUpdated(address))
                }
                Some(_) => Ok(AclEvent::AclSubtracted { acl: acl.clone() }),
            },
            AclCommand::Delete => match current {
                None => Err(AclRejection::AclNotFound(address)),
                Some(current) if current.is_empty() => Err(AclRejection::IsEmpty(address)),
                Some(_) => Ok(AclEvent::AclDeleted),
            },
        }
    }

    fn next(state: Option<AclState>, event: &AclEvent, meta: &EventMeta) -> Option<AclState> {
        let created = |address: &Scope, acl: Acl| AclState {
            address: address.clone(),
            acl,
            revision: meta.revision,
            created_at: meta.instant,
            created_by: meta.subject.clone(),
            updated_at: meta.instant,
            updated_by: meta.subject.clone(),
        };
        let touched = |s: AclState, acl: Acl| AclState {
            acl,
            revision: meta.revision,
            updated_at: meta.instant,
            updated_by: meta.subject.clone(),
            ..s
        };

        match (state, event) {
            (None, AclEvent::AclReplaced { address, acl })
            | (None, AclEvent::AclAppended { address, acl }) => Some(created(address, acl.clone())),
            (Some(s), AclEvent::AclReplaced { acl, .. }) => Some(touched(s, acl.clone())),
            (Some(s), AclEvent::AclAppended { acl, .. }) => {
                let merged = s.acl.merge(acl);
                Some(touched(s, merged))
            }
            (Some(s), AclEvent::AclSubtracted { acl }) => {
                let remaining = s.acl.subtract(acl);
                Some(touched(s, remaining))
            }
            (Some(s), AclEvent::AclDeleted) => Some(touched(s, Acl::new())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Identity;
    use common::permission::resources;

    fn address() -> Scope {
        Scope::Root
    }

    fn key() -> AggregateKey {
        AggregateKey::acl(&address())
    }

    fn read_for_anonymous() -> Acl {
        Acl::new().grant(Identity::Anonymous, [resources::read()])
    }

    fn apply(state: Option<AclState>, command: AclCommand, revision: i64) -> AclState {
        let event = Acls::evaluate(&key(), state.as_ref(), &command).unwrap();
        let meta = EventMeta {
            revision: Revision::new(revision),
            instant: Utc::now(),
            subject: Subject::Anonymous,
        };
        Acls::next(state, &event, &meta).unwrap()
    }

    #[test]
    fn append_then_delete_empties_the_acl() {
        let state = apply(
            None,
            AclCommand::Append {
                acl: read_for_anonymous(),
            },
            1,
        );
        assert!(state.acl.has_permission([&Identity::Anonymous], &resources::read()));

        let deleted = apply(Some(state), AclCommand::Delete, 2);
        assert!(deleted.acl.is_empty());
        assert_eq!(deleted.revision, Revision::new(2));
        assert_eq!(
            Acls::evaluate(&key(), Some(&deleted), &AclCommand::Delete),
            Err(AclRejection::IsEmpty(address()))
        );
    }

    #[test]
    fn unchanged_acl_is_rejected() {
        let state = apply(
            None,
            AclCommand::Replace {
                acl: read_for_anonymous(),
            },
            1,
        );
        assert_eq!(
            Acls::evaluate(
                &key(),
                Some(&state),
                &AclCommand::Append {
                    acl: read_for_anonymous()
                }
            ),
            Err(AclRejection::NothingToBeUpdated(address()))
        );
        assert_eq!(
            Acls::evaluate(
                &key(),
                Some(&state),
                &AclCommand::Subtract {
                    acl: Acl::new().grant(Identity::Anonymous, [resources::write()])
                }
            ),
            Err(AclRejection::NothingToBeUpdated(address()))
        );
    }

    #[test]
    fn missing_acl_cannot_be_subtracted_from() {
        assert_eq!(
            Acls::evaluate(
                &key(),
                None,
                &AclCommand::Subtract {
                    acl: read_for_anonymous()
                }
            ),
            Err(AclRejection::AclNotFound(address()))
        );
    }
}
