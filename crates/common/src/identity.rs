use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// The acting subject recorded on every event.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum Subject {
    Anonymous,
    User { subject: String, realm: String },
}

impl Subject {
    /// Creates a user subject.
    pub fn user(subject: impl Into<String>, realm: impl Into<String>) -> Self {
        Subject::User {
            subject: subject.into(),
            realm: realm.into(),
        }
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Subject::Anonymous => f.write_str("anonymous"),
            Subject::User { subject, realm } => write!(f, "{subject}@{realm}"),
        }
    }
}

/// An identity an ACL can grant permissions to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum Identity {
    Anonymous,
    Authenticated { realm: String },
    User { subject: String, realm: String },
}

impl From<&Subject> for Identity {
    fn from(subject: &Subject) -> Self {
        match subject {
            Subject::Anonymous => Identity::Anonymous,
            Subject::User { subject, realm } => Identity::User {
                subject: subject.clone(),
                realm: realm.clone(),
            },
        }
    }
}

/// A subject together with every identity it can act as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub subject: Subject,
    pub identities: BTreeSet<Identity>,
}

impl Caller {
    /// Builds a caller with an explicit identity set.
    pub fn new(subject: Subject, identities: BTreeSet<Identity>) -> Self {
        Self {
            subject,
            identities,
        }
    }

    /// The anonymous caller.
    pub fn anonymous() -> Self {
        Caller::from(Subject::Anonymous)
    }
}

impl From<Subject> for Caller {
    /// Derives identities from a subject: a user is also authenticated in its
    /// realm, and every caller is anonymous.
    fn from(subject: Subject) -> Self {
        let mut identities = BTreeSet::from([Identity::Anonymous]);
        if let Subject::User { realm, .. } = &subject {
            identities.insert(Identity::Authenticated {
                realm: realm.clone(),
            });
            identities.insert(Identity::from(&subject));
        }
        Self {
            subject,
            identities,
        }
    }
}
