//! Resolvers: per-project policies deciding where references are looked up.

mod commands;
mod events;
mod provisioning;
mod resolution;
mod service;
mod state;
mod value;

pub use commands::ResolverCommand;
pub use events::ResolverEvent;
pub use provisioning::{DEFAULT_RESOLVER_ID, DefaultResolverHook};
pub use resolution::{
    FailureReason, IN_PROJECT, Resolution, ResolutionError, ResolutionReport, Resolved,
    ResolverAttempt, ResolverFailure,
};
pub use service::ResolverService;
pub use state::Resolver;
pub use value::{IdentityResolution, Priority, ResolverValue};

use common::{AggregateKey, EntityType, Iri, ProjectRef};
use thiserror::Error;

use crate::entity::{Entity, EventMeta};

/// Rejections of resolver commands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolverRejection {
    #[error("Resolver '{id}' already exists in project '{project}'")]
    AlreadyExists { id: Iri, project: ProjectRef },

    #[error("Resolver '{0}' was not found")]
    NotFound(AggregateKey),

    #[error("Resolver '{0}' is deprecated")]
    IsDeprecated(Iri),

    #[error("Resolver '{id}' is of type '{expected}', '{provided}' was provided")]
    DifferentResolverType {
        id: Iri,
        expected: &'static str,
        provided: &'static str,
    },

    #[error("Resolver '{id}' already uses priority '{priority}' in project '{project}'")]
    PriorityAlreadyExists {
        project: ProjectRef,
        id: Iri,
        priority: Priority,
    },

    #[error("A resolver with provided identities needs at least one identity")]
    NoIdentities,

    #[error("Project '{0}' was not found")]
    ProjectNotFound(ProjectRef),

    #[error("Project '{0}' is deprecated")]
    ProjectIsDeprecated(ProjectRef),
}

fn validate(value: &ResolverValue) -> Result<(), ResolverRejection> {
    match value {
        ResolverValue::CrossProject {
            identities: IdentityResolution::ProvidedIdentities { identities },
            ..
        } if identities.is_empty() => Err(ResolverRejection::NoIdentities),
        _ => Ok(()),
    }
}

/// The resolver entity.
pub struct Resolvers;

impl Entity for Resolvers {
    const ENTITY_TYPE: EntityType = EntityType::Resolver;

    type State = Resolver;
    type Command = ResolverCommand;
    type Event = ResolverEvent;
    type Rejection = ResolverRejection;

    fn evaluate(
        key: &AggregateKey,
        state: Option<&Resolver>,
        command: &ResolverCommand,
    ) -> Result<ResolverEvent, ResolverRejection> {
        match (state, command) {
            (None, ResolverCommand::Create { id, project, value }) => {
                validate(value)?;
                Ok(ResolverEvent::ResolverCreated {
                    id: id.clone(),
                    project: project.clone(),
                    value: value.clone(),
                })
            }
            (Some(_), ResolverCommand::Create { id, project, .. }) => {
                Err(ResolverRejection::AlreadyExists {
                    id: id.clone(),
                    project: project.clone(),
                })
            }
            (None, _) => Err(ResolverRejection::NotFound(key.clone())),
            (Some(current), _) if current.deprecated => {
                Err(ResolverRejection::IsDeprecated(current.id.clone()))
            }
            (Some(current), ResolverCommand::Update { value }) => {
                if current.value.kind() != value.kind() {
                    return Err(ResolverRejection::DifferentResolverType {
                        id: current.id.clone(),
                        expected: current.value.kind(),
                        provided: value.kind(),
                    });
                }
                validate(value)?;
                Ok(ResolverEvent::ResolverUpdated {
                    value: value.clone(),
                })
            }
            (Some(_), ResolverCommand::Deprecate) => Ok(ResolverEvent::ResolverDeprecated),
        }
    }

    fn next(state: Option<Resolver>, event: &ResolverEvent, meta: &EventMeta) -> Option<Resolver> {
        match (state, event) {
            (None, ResolverEvent::ResolverCreated { id, project, value }) => {
                Some(Resolver::created(id, project, value, meta))
            }
            (Some(r), ResolverEvent::ResolverUpdated { value }) => Some(Resolver {
                value: value.clone(),
                ..r.touched(meta)
            }),
            (Some(r), ResolverEvent::ResolverDeprecated) => Some(Resolver {
                deprecated: true,
                ..r.touched(meta)
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use chrono::Utc;
    use common::Subject;
    use event_store::Revision;

    fn project() -> ProjectRef {
        ProjectRef::unsafe_from("acme", "data").unwrap()
    }

    fn id() -> Iri {
        Iri::new("https://acme.example/resolvers/shared").unwrap()
    }

    fn key() -> AggregateKey {
        AggregateKey::resolver(&project(), &id())
    }

    fn cross_project(identities: IdentityResolution) -> ResolverValue {
        ResolverValue::CrossProject {
            priority: 5,
            projects: vec![ProjectRef::unsafe_from("acme", "shared").unwrap()],
            resource_types: BTreeSet::new(),
            identities,
        }
    }

    fn created(value: ResolverValue) -> Resolver {
        let event = Resolvers::evaluate(
            &key(),
            None,
            &ResolverCommand::Create {
                id: id(),
                project: project(),
                value,
            },
        )
        .unwrap();
        let meta = EventMeta {
            revision: Revision::first(),
            instant: Utc::now(),
            subject: Subject::Anonymous,
        };
        Resolvers::next(None, &event, &meta).unwrap()
    }

    #[test]
    fn provided_identities_must_not_be_empty() {
        let result = Resolvers::evaluate(
            &key(),
            None,
            &ResolverCommand::Create {
                id: id(),
                project: project(),
                value: cross_project(IdentityResolution::ProvidedIdentities {
                    identities: BTreeSet::new(),
                }),
            },
        );
        assert_eq!(result, Err(ResolverRejection::NoIdentities));
    }

    #[test]
    fn update_cannot_change_the_resolver_kind() {
        let resolver = created(cross_project(IdentityResolution::UseCurrentCaller));
        let result = Resolvers::evaluate(
            &key(),
            Some(&resolver),
            &ResolverCommand::Update {
                value: ResolverValue::InProject { priority: 1 },
            },
        );
        assert_eq!(
            result,
            Err(ResolverRejection::DifferentResolverType {
                id: id(),
                expected: "CrossProject",
                provided: "InProject",
            })
        );
    }

    #[test]
    fn deprecated_resolver_rejects_commands() {
        let resolver = Resolver {
            deprecated: true,
            ..created(ResolverValue::InProject { priority: 1 })
        };
        assert_eq!(
            Resolvers::evaluate(&key(), Some(&resolver), &ResolverCommand::Deprecate),
            Err(ResolverRejection::IsDeprecated(id()))
        );
    }
}
