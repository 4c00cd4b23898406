use common::{FormatError, Iri};
use event_store::Revision;
use serde::Serialize;

/// A pointer to a resource: its latest state, an exact revision or a tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "@type", rename_all = "camelCase")]
pub enum ResourceRef {
    Latest { id: Iri },
    Revision { id: Iri, rev: Revision },
    Tag { id: Iri, tag: String },
}

impl ResourceRef {
    pub fn latest(id: Iri) -> Self {
        ResourceRef::Latest { id }
    }

    pub fn revision(id: Iri, rev: Revision) -> Self {
        ResourceRef::Revision { id, rev }
    }

    pub fn tag(id: Iri, tag: impl Into<String>) -> Self {
        ResourceRef::Tag {
            id,
            tag: tag.into(),
        }
    }

    pub fn id(&self) -> &Iri {
        match self {
            ResourceRef::Latest { id }
            | ResourceRef::Revision { id, .. }
            | ResourceRef::Tag { id, .. } => id,
        }
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceRef::Latest { id } => write!(f, "{id}"),
            ResourceRef::Revision { id, rev } => write!(f, "{id}?rev={rev}"),
            ResourceRef::Tag { id, tag } => write!(f, "{id}?tag={tag}"),
        }
    }
}

/// Parses `iri`, `iri?rev=N` or `iri?tag=name`. Any other query string is
/// kept as part of the IRI.
impl std::str::FromStr for ResourceRef {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((id, query)) = s.rsplit_once('?') {
            if let Some(rev) = query.strip_prefix("rev=")
                && let Ok(rev) = rev.parse::<i64>()
            {
                return Ok(ResourceRef::revision(Iri::new(id)?, Revision::new(rev)));
            }
            if let Some(tag) = query.strip_prefix("tag=")
                && !tag.is_empty()
            {
                return Ok(ResourceRef::tag(Iri::new(id)?, tag));
            }
        }
        Ok(ResourceRef::latest(Iri::new(s)?))
    }
}
