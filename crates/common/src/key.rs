use serde::{Deserialize, Serialize};

use crate::types::{FormatError, Iri, Label, ProjectRef};

/// The kind of entity an aggregate belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Organization,
    Project,
    Resolver,
    Resource,
    Acl,
}

impl EntityType {
    /// All entity types, in dependency order.
    pub const ALL: [EntityType; 5] = [
        EntityType::Acl,
        EntityType::Organization,
        EntityType::Project,
        EntityType::Resolver,
        EntityType::Resource,
    ];

    /// Returns the entity type name as used in keys and tags.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Organization => "organization",
            EntityType::Project => "project",
            EntityType::Resolver => "resolver",
            EntityType::Resource => "resource",
            EntityType::Acl => "acl",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| FormatError::AggregateKey(s.to_string()))
    }
}

/// The tenant scope an aggregate lives in.
///
/// Also used as the address of an ACL: root, an organization or a project.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Scope {
    Root,
    Organization(Label),
    Project(ProjectRef),
}

impl Scope {
    /// Returns the organization this scope belongs to, if any.
    pub fn organization(&self) -> Option<&Label> {
        match self {
            Scope::Root => None,
            Scope::Organization(org) => Some(org),
            Scope::Project(project) => Some(&project.organization),
        }
    }

    /// Returns the parent scope, or `None` for root.
    pub fn parent(&self) -> Option<Scope> {
        match self {
            Scope::Root => None,
            Scope::Organization(_) => Some(Scope::Root),
            Scope::Project(project) => Some(Scope::Organization(project.organization.clone())),
        }
    }

    /// Returns this scope followed by all its ancestors up to root.
    pub fn ancestry(&self) -> Vec<Scope> {
        let mut scopes = vec![self.clone()];
        let mut current = self.parent();
        while let Some(scope) = current {
            current = scope.parent();
            scopes.push(scope);
        }
        scopes
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Root => f.write_str("/"),
            Scope::Organization(org) => write!(f, "{org}"),
            Scope::Project(project) => write!(f, "{project}"),
        }
    }
}

impl std::str::FromStr for Scope {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "/" {
            Ok(Scope::Root)
        } else if s.contains('/') {
            Ok(Scope::Project(s.parse()?))
        } else {
            Ok(Scope::Organization(Label::new(s)?))
        }
    }
}

impl From<ProjectRef> for Scope {
    fn from(project: ProjectRef) -> Self {
        Scope::Project(project)
    }
}

impl TryFrom<String> for Scope {
    type Error = FormatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        scope.to_string()
    }
}

/// Stable compound identifier of one aggregate's event sequence.
///
/// Rendered as `{entity}:{scope}:{id}`. Labels never contain `:` or `/`,
/// so the first two segments are unambiguous even when `id` is an IRI.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AggregateKey {
    entity_type: EntityType,
    scope: Scope,
    id: String,
}

impl AggregateKey {
    /// Identifier used for ACL aggregates, of which there is one per address.
    pub const ACL_ID: &'static str = "acl";

    /// Key of an organization aggregate.
    pub fn organization(label: &Label) -> Self {
        Self {
            entity_type: EntityType::Organization,
            scope: Scope::Root,
            id: label.to_string(),
        }
    }

    /// Key of a project aggregate.
    pub fn project(project: &ProjectRef) -> Self {
        Self {
            entity_type: EntityType::Project,
            scope: Scope::Organization(project.organization.clone()),
            id: project.project.to_string(),
        }
    }

    /// Key of a resolver aggregate.
    pub fn resolver(project: &ProjectRef, id: &Iri) -> Self {
        Self {
            entity_type: EntityType::Resolver,
            scope: Scope::Project(project.clone()),
            id: id.to_string(),
        }
    }

    /// Key of a resource aggregate.
    pub fn resource(project: &ProjectRef, id: &Iri) -> Self {
        Self {
            entity_type: EntityType::Resource,
            scope: Scope::Project(project.clone()),
            id: id.to_string(),
        }
    }

    /// Key of the ACL aggregate at an address.
    pub fn acl(address: &Scope) -> Self {
        Self {
            entity_type: EntityType::Acl,
            scope: address.clone(),
            id: Self::ACL_ID.to_string(),
        }
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the organization this aggregate belongs to.
    ///
    /// An organization aggregate belongs to itself.
    pub fn organization_label(&self) -> Option<Label> {
        match (&self.entity_type, &self.scope) {
            (EntityType::Organization, Scope::Root) => Label::new(self.id.clone()).ok(),
            (_, scope) => scope.organization().cloned(),
        }
    }

    /// Returns the project this aggregate belongs to.
    ///
    /// A project aggregate belongs to itself.
    pub fn project_ref(&self) -> Option<ProjectRef> {
        match (&self.entity_type, &self.scope) {
            (EntityType::Project, Scope::Organization(org)) => Label::new(self.id.clone())
                .ok()
                .map(|project| ProjectRef::new(org.clone(), project)),
            (_, Scope::Project(project)) => Some(project.clone()),
            _ => None,
        }
    }
}

impl std::fmt::Display for AggregateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.entity_type, self.scope, self.id)
    }
}

impl std::str::FromStr for AggregateKey {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || FormatError::AggregateKey(s.to_string());
        let mut parts = s.splitn(3, ':');
        let (Some(entity), Some(scope), Some(id)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        if id.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            entity_type: entity.parse().map_err(|_| invalid())?,
            scope: scope.parse().map_err(|_| invalid())?,
            id: id.to_string(),
        })
    }
}

impl TryFrom<String> for AggregateKey {
    type Error = FormatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AggregateKey> for String {
    fn from(key: AggregateKey) -> Self {
        key.to_string()
    }
}
