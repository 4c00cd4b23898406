//! Project commands.

use common::{Iri, ProjectRef};
use serde::{Deserialize, Serialize};

/// The mutable fields of a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFields {
    /// Free-form description.
    pub description: Option<String>,

    /// Prefix used to expand compact resource ids.
    pub base: Option<Iri>,

    /// Prefix used to expand compact property names.
    pub vocab: Option<Iri>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectCommand {
    Create {
        project: ProjectRef,
        fields: ProjectFields,
    },
    Update {
        fields: ProjectFields,
    },
    Deprecate,
}
