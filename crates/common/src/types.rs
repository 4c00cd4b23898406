use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a string does not form a valid identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("Invalid label '{0}': expected 1 to 64 characters of [A-Za-z0-9_-]")]
    Label(String),

    #[error("Invalid project reference '{0}': expected '{{organization}}/{{project}}'")]
    ProjectRef(String),

    #[error("Invalid IRI '{0}'")]
    Iri(String),

    #[error("Invalid aggregate key '{0}'")]
    AggregateKey(String),
}

/// A tenant label, used for organizations and projects.
///
/// Labels are 1 to 64 characters drawn from `[A-Za-z0-9_-]`, which keeps
/// them safe to embed in keys, tags and URL paths.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Label(String);

impl Label {
    /// Maximum length of a label.
    pub const MAX_LENGTH: usize = 64;

    /// Creates a label, validating its format.
    pub fn new(value: impl Into<String>) -> Result<Self, FormatError> {
        let value = value.into();
        let valid = !value.is_empty()
            && value.len() <= Self::MAX_LENGTH
            && value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if valid {
            Ok(Self(value))
        } else {
            Err(FormatError::Label(value))
        }
    }

    /// Returns the label as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Label {
    type Error = FormatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Label> for String {
    fn from(label: Label) -> Self {
        label.0
    }
}

impl std::str::FromStr for Label {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Reference to a project within an organization.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectRef {
    pub organization: Label,
    pub project: Label,
}

impl ProjectRef {
    /// Creates a project reference from its two labels.
    pub fn new(organization: Label, project: Label) -> Self {
        Self {
            organization,
            project,
        }
    }

    /// Parses both labels and builds a project reference.
    pub fn unsafe_from(organization: &str, project: &str) -> Result<Self, FormatError> {
        Ok(Self::new(Label::new(organization)?, Label::new(project)?))
    }
}

impl std::fmt::Display for ProjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.organization, self.project)
    }
}

impl std::str::FromStr for ProjectRef {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (org, proj) = s
            .split_once('/')
            .ok_or_else(|| FormatError::ProjectRef(s.to_string()))?;
        Self::unsafe_from(org, proj).map_err(|_| FormatError::ProjectRef(s.to_string()))
    }
}

impl TryFrom<String> for ProjectRef {
    type Error = FormatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProjectRef> for String {
    fn from(project: ProjectRef) -> Self {
        project.to_string()
    }
}

/// An absolute IRI identifying a resource or resolver.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Iri(String);

impl Iri {
    /// Creates an IRI. It must start with a scheme and contain no whitespace.
    pub fn new(value: impl Into<String>) -> Result<Self, FormatError> {
        let value = value.into();
        if value.chars().any(char::is_whitespace) {
            return Err(FormatError::Iri(value));
        }
        let Some((scheme, rest)) = value.split_once(':') else {
            return Err(FormatError::Iri(value));
        };
        let mut chars = scheme.chars();
        let scheme_ok = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'));
        if scheme_ok && !rest.is_empty() {
            Ok(Self(value))
        } else {
            Err(FormatError::Iri(value))
        }
    }

    /// Returns the IRI as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Iri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Iri {
    type Error = FormatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Iri> for String {
    fn from(iri: Iri) -> Self {
        iri.0
    }
}

impl std::str::FromStr for Iri {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
