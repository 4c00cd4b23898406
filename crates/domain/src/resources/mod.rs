//! Resources: arbitrary JSON documents with types, tags and full history.

mod commands;
mod events;
mod reference;
mod service;
mod state;

pub use commands::ResourceCommand;
pub use events::{ResourceCreatedData, ResourceEvent, ResourceUpdatedData};
pub use reference::ResourceRef;
pub use service::ResourceService;
pub use state::Resource;

use common::{AggregateKey, EntityType, Iri, ProjectRef};
use event_store::Revision;
use thiserror::Error;

use crate::entity::{Entity, EventMeta};

/// Rejections of resource commands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceRejection {
    #[error("Resource '{id}' already exists in project '{project}'")]
    AlreadyExists { id: Iri, project: ProjectRef },

    #[error("Resource '{0}' was not found")]
    NotFound(AggregateKey),

    #[error("Resource '{0}' is deprecated")]
    IsDeprecated(Iri),

    #[error("Revision '{provided}' does not exist, the current revision is '{current}'")]
    RevisionNotFound { provided: Revision, current: Revision },

    #[error("Tag '{0}' does not exist")]
    TagNotFound(String),

    #[error("Invalid source: {0}")]
    InvalidSource(String),

    #[error("Project '{0}' was not found")]
    ProjectNotFound(ProjectRef),

    #[error("Project '{0}' is deprecated")]
    ProjectIsDeprecated(ProjectRef),
}

fn validate_source(source: &serde_json::Value) -> Result<(), ResourceRejection> {
    if source.is_object() {
        Ok(())
    } else {
        Err(ResourceRejection::InvalidSource(
            "the source must be a JSON object".to_string(),
        ))
    }
}

/// The resource entity.
pub struct Resources;

impl Entity for Resources {
    const ENTITY_TYPE: EntityType = EntityType::Resource;

    type State = Resource;
    type Command = ResourceCommand;
    type Event = ResourceEvent;
    type Rejection = ResourceRejection;

    fn evaluate(
        key: &AggregateKey,
        state: Option<&Resource>,
        command: &ResourceCommand,
    ) -> Result<ResourceEvent, ResourceRejection> {
        use ResourceCommand as C;
        use ResourceRejection as R;

        match (state, command) {
            (
                None,
                C::Create {
                    id,
                    project,
                    types,
                    source,
                },
            ) => {
                validate_source(source)?;
                Ok(ResourceEvent::ResourceCreated(ResourceCreatedData {
                    id: id.clone(),
                    project: project.clone(),
                    types: types.clone(),
                    source: source.clone(),
                }))
            }
            (Some(_), C::Create { id, project, .. }) => Err(R::AlreadyExists {
                id: id.clone(),
                project: project.clone(),
            }),
            (None, _) => Err(R::NotFound(key.clone())),
            (Some(current), _) if current.deprecated => Err(R::IsDeprecated(current.id.clone())),
            (Some(_), C::Update { types, source }) => {
                validate_source(source)?;
                Ok(ResourceEvent::ResourceUpdated(ResourceUpdatedData {
                    types: types.clone(),
                    source: source.clone(),
                }))
            }
            (Some(current), C::Tag { tag, target }) => {
                if *target < Revision::first() || *target > current.revision {
                    return Err(R::RevisionNotFound {
                        provided: *target,
                        current: current.revision,
                    });
                }
                Ok(ResourceEvent::ResourceTagAdded {
                    tag: tag.clone(),
                    target: *target,
                })
            }
            (Some(current), C::DeleteTag { tag }) => {
                if current.tags.contains_key(tag) {
                    Ok(ResourceEvent::ResourceTagDeleted { tag: tag.clone() })
                } else {
                    Err(R::TagNotFound(tag.clone()))
                }
            }
            (Some(_), C::Deprecate) => Ok(ResourceEvent::ResourceDeprecated),
        }
    }

    fn next(state: Option<Resource>, event: &ResourceEvent, meta: &EventMeta) -> Option<Resource> {
        match (state, event) {
            (None, ResourceEvent::ResourceCreated(data)) => Some(Resource::created(data, meta)),
            (Some(r), ResourceEvent::ResourceUpdated(data)) => Some(Resource {
                types: data.types.clone(),
                source: data.source.clone(),
                ..r.touched(meta)
            }),
            (Some(r), ResourceEvent::ResourceTagAdded { tag, target }) => {
                let mut next = r.touched(meta);
                next.tags.insert(tag.clone(), *target);
                Some(next)
            }
            (Some(r), ResourceEvent::ResourceTagDeleted { tag }) => {
                let mut next = r.touched(meta);
                next.tags.remove(tag);
                Some(next)
            }
            (Some(r), ResourceEvent::ResourceDeprecated) => Some(Resource {
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
    use crate::entity::EntityState;
    use chrono::Utc;
    use common::Subject;
    use serde_json::json;

    fn project() -> ProjectRef {
        ProjectRef::unsafe_from("acme", "data").unwrap()
    }

    fn id() -> Iri {
        Iri::new("https://acme.example/r1").unwrap()
    }

    fn key() -> AggregateKey {
        AggregateKey::resource(&project(), &id())
    }

    fn meta(revision: i64) -> EventMeta {
        EventMeta {
            revision: Revision::new(revision),
            instant: Utc::now(),
            subject: Subject::Anonymous,
        }
    }

    fn run(state: Option<Resource>, command: ResourceCommand, revision: i64) -> Resource {
        let event = Resources::evaluate(&key(), state.as_ref(), &command).unwrap();
        Resources::next(state, &event, &meta(revision)).unwrap()
    }

    fn created() -> Resource {
        run(
            None,
            ResourceCommand::Create {
                id: id(),
                project: project(),
                types: BTreeSet::from([Iri::new("https://schema.org/Person").unwrap()]),
                source: json!({ "name": "Alice" }),
            },
            1,
        )
    }

    #[test]
    fn create_requires_an_object_source() {
        let result = Resources::evaluate(
            &key(),
            None,
            &ResourceCommand::Create {
                id: id(),
                project: project(),
                types: BTreeSet::new(),
                source: json!([1, 2]),
            },
        );
        assert!(matches!(result, Err(ResourceRejection::InvalidSource(_))));
    }

    #[test]
    fn tags_point_at_existing_revisions_only() {
        let r1 = created();
        let r2 = run(
            Some(r1),
            ResourceCommand::Update {
                types: BTreeSet::new(),
                source: json!({ "name": "Bob" }),
            },
            2,
        );

        let too_far = Resources::evaluate(
            &key(),
            Some(&r2),
            &ResourceCommand::Tag {
                tag: "v1".into(),
                target: Revision::new(3),
            },
        );
        assert_eq!(
            too_far,
            Err(ResourceRejection::RevisionNotFound {
                provided: Revision::new(3),
                current: Revision::new(2)
            })
        );

        let r3 = run(
            Some(r2),
            ResourceCommand::Tag {
                tag: "v1".into(),
                target: Revision::first(),
            },
            3,
        );
        assert_eq!(r3.tagged("v1"), Some(Revision::first()));
        assert_eq!(r3.revision(), Revision::new(3));

        let r4 = run(Some(r3), ResourceCommand::DeleteTag { tag: "v1".into() }, 4);
        assert_eq!(r4.tagged("v1"), None);
        assert_eq!(
            Resources::evaluate(&key(), Some(&r4), &ResourceCommand::DeleteTag { tag: "v1".into() }),
            Err(ResourceRejection::TagNotFound("v1".into()))
        );
    }

    #[test]
    fn deprecated_resources_reject_updates() {
        let deprecated = run(Some(created()), ResourceCommand::Deprecate, 2);
        assert!(deprecated.deprecated());
        assert_eq!(
            Resources::evaluate(&key(), Some(&deprecated), &ResourceCommand::Deprecate),
            Err(ResourceRejection::IsDeprecated(id()))
        );
    }

    #[test]
    fn missing_resource_is_not_found() {
        assert_eq!(
            Resources::evaluate(&key(), None, &ResourceCommand::Deprecate),
            Err(ResourceRejection::NotFound(key()))
        );
    }

    #[test]
    fn create_on_existing_resource_is_rejected() {
        let deprecated = run(Some(created()), ResourceCommand::Deprecate, 2);
        let create = ResourceCommand::Create {
            id: id(),
            project: project(),
            types: BTreeSet::new(),
            source: json!({}),
        };
        for existing in [created(), deprecated] {
            assert_eq!(
                Resources::evaluate(&key(), Some(&existing), &create),
                Err(ResourceRejection::AlreadyExists {
                    id: id(),
                    project: project()
                })
            );
        }
    }
}
