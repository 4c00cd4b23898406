//! Projects: the tenants resources live in, owned by an organization.

mod commands;
mod events;
mod service;
mod state;

pub use commands::{ProjectCommand, ProjectFields};
pub use events::ProjectEvent;
pub use service::ProjectService;
pub use state::Project;

use common::{AggregateKey, EntityType, Label, ProjectRef};
use thiserror::Error;

use crate::entity::{Entity, EventMeta};

/// Rejections of project commands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectRejection {
    #[error("Project '{0}' already exists")]
    AlreadyExists(ProjectRef),

    #[error("Project '{0}' was not found")]
    NotFound(AggregateKey),

    #[error("Project '{0}' is deprecated")]
    IsDeprecated(ProjectRef),

    #[error("Organization '{0}' was not found")]
    OrganizationNotFound(Label),

    #[error("Organization '{0}' is deprecated")]
    OrganizationIsDeprecated(Label),
}

/// The project entity.
pub struct Projects;

impl Entity for Projects {
    const ENTITY_TYPE: EntityType = EntityType::Project;

    type State = Project;
    type Command = ProjectCommand;
    type Event = ProjectEvent;
    type Rejection = ProjectRejection;

    fn evaluate(
        key: &AggregateKey,
        state: Option<&Project>,
        command: &ProjectCommand,
    ) -> Result<ProjectEvent, ProjectRejection> {
        match (state, command) {
            (None, ProjectCommand::Create { project, fields }) => Ok(ProjectEvent::ProjectCreated {
                project: project.clone(),
                fields: fields.clone(),
            }),
            (Some(_), ProjectCommand::Create { project, .. }) => {
                Err(ProjectRejection::AlreadyExists(project.clone()))
            }
            (None, _) => Err(ProjectRejection::NotFound(key.clone())),
            (Some(p), _) if p.deprecated => Err(ProjectRejection::IsDeprecated(p.project.clone())),
            (Some(_), ProjectCommand::Update { fields }) => Ok(ProjectEvent::ProjectUpdated {
                fields: fields.clone(),
            }),
            (Some(_), ProjectCommand::Deprecate) => Ok(ProjectEvent::ProjectDeprecated),
        }
    }

    fn next(state: Option<Project>, event: &ProjectEvent, meta: &EventMeta) -> Option<Project> {
        match (state, event) {
            (None, ProjectEvent::ProjectCreated { project, fields }) => {
                Some(Project::created(project.clone(), fields.clone(), meta))
            }
            (Some(p), ProjectEvent::ProjectUpdated { fields }) => Some(Project {
                description: fields.description.clone(),
                base: fields.base.clone(),
                vocab: fields.vocab.clone(),
                ..p.touched(meta)
            }),
            (Some(p), ProjectEvent::ProjectDeprecated) => Some(Project {
                deprecated: true,
                ..p.touched(meta)
            }),
            _ => None,
        }
    }
}
