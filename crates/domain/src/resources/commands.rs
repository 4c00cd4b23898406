//! Resource commands.

use std::collections::BTreeSet;

use common::{Iri, ProjectRef};
use event_store::Revision;

#[derive(Debug, Clone, PartialEq)]
pub enum ResourceCommand {
    /// Creates a resource from a JSON object source.
    Create {
        id: Iri,
        project: ProjectRef,
        types: BTreeSet<Iri>,
        source: serde_json::Value,
    },

    /// Replaces the types and source of a resource.
    Update {
        types: BTreeSet<Iri>,
        source: serde_json::Value,
    },

    /// Points `tag` at an existing revision, replacing any previous target.
    Tag { tag: String, target: Revision },

    /// Removes a tag.
    DeleteTag { tag: String },

    Deprecate,
}
