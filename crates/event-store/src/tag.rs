use common::{AggregateKey, EntityType, Label, ProjectRef};
use serde::{Deserialize, Serialize};

/// A secondary index over the log.
///
/// Each appended event is indexed under the tags returned by
/// [`Tag::for_key`]. [`Tag::all`] addresses the whole log and is never stored.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
    const ALL: &'static str = "all";

    /// The whole log, in global offset order.
    pub fn all() -> Self {
        Self(Self::ALL.to_string())
    }

    pub fn entity(entity_type: EntityType) -> Self {
        Self(format!("entity:{entity_type}"))
    }

    pub fn organization(label: &Label) -> Self {
        Self(format!("org:{label}"))
    }

    pub fn project(project: &ProjectRef) -> Self {
        Self(format!("project:{project}"))
    }

    pub fn is_all(&self) -> bool {
        self.0 == Self::ALL
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Tags an event of the given aggregate is indexed under.
    pub fn for_key(key: &AggregateKey) -> Vec<Tag> {
        let mut tags = vec![Tag::entity(key.entity_type())];
        if let Some(org) = key.organization_label() {
            tags.push(Tag::organization(&org));
        }
        if let Some(project) = key.project_ref() {
            tags.push(Tag::project(&project));
        }
        tags
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Iri, Scope};

    #[test]
    fn resource_events_are_tagged_by_entity_org_and_project() {
        let project = ProjectRef::unsafe_from("org", "proj").unwrap();
        let key = AggregateKey::resource(&project, &Iri::new("urn:x:1").unwrap());
        let tags = Tag::for_key(&key);
        assert_eq!(
            tags,
            vec![
                Tag::entity(EntityType::Resource),
                Tag::organization(&project.organization),
                Tag::project(&project),
            ]
        );
        assert_eq!(tags[2].as_str(), "project:org/proj");
    }

    #[test]
    fn root_acl_is_only_tagged_by_entity() {
        let tags = Tag::for_key(&AggregateKey::acl(&Scope::Root));
        assert_eq!(tags, vec![Tag::entity(EntityType::Acl)]);
        assert!(!tags.iter().any(Tag::is_all));
    }
}
