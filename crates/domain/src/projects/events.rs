//! Project domain events.

use common::ProjectRef;
use serde::{Deserialize, Serialize};

use crate::entity::DomainEvent;

use super::ProjectFields;

/// Events that can occur on a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ProjectEvent {
    /// Project was created.
    ProjectCreated {
        project: ProjectRef,
        fields: ProjectFields,
    },

    /// Project fields were replaced.
    ProjectUpdated { fields: ProjectFields },

    /// Project was deprecated.
    ProjectDeprecated,
}

impl DomainEvent for ProjectEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProjectEvent::ProjectCreated { .. } => "ProjectCreated",
            ProjectEvent::ProjectUpdated { .. } => "ProjectUpdated",
            ProjectEvent::ProjectDeprecated => "ProjectDeprecated",
        }
    }
}
