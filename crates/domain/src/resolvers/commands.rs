//! Resolver commands.

use common::{Iri, ProjectRef};

use super::ResolverValue;

#[derive(Debug, Clone, PartialEq)]
pub enum ResolverCommand {
    Create {
        id: Iri,
        project: ProjectRef,
        value: ResolverValue,
    },

    /// Replaces the value; the resolver kind cannot change.
    Update { value: ResolverValue },

    Deprecate,
}
