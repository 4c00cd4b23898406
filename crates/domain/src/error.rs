//! Domain error types.

use std::time::Duration;

use common::{AggregateKey, EntityType, Permission, Scope};
use event_store::{EventLogError, Revision};
use thiserror::Error;

/// Errors returned when submitting a command.
///
/// Rejections are expected business outcomes and carry enough structure to
/// identify the violated precondition; the remaining variants are
/// infrastructure failures.
#[derive(Debug, Error)]
pub enum CommandError<R> {
    /// The caller expected a different revision than the current one.
    #[error("Incorrect revision '{provided}' provided for '{key}', expected '{expected}'")]
    IncorrectRevision {
        key: AggregateKey,
        provided: Revision,
        expected: Revision,
    },

    /// The entity refused the command.
    #[error(transparent)]
    Rejected(R),

    /// The caller lacks a permission on an address.
    #[error("Permission '{permission}' is required on '{address}'")]
    Unauthorized {
        permission: Permission,
        address: Scope,
    },

    /// No more entities of a type may be created in a scope.
    #[error("Quota for '{entity_type}' reached in '{scope}'")]
    QuotaReached {
        scope: Scope,
        entity_type: EntityType,
    },

    /// Concurrent writers kept winning the race for the same aggregate.
    #[error("Write contention on '{key}' after {attempts} attempts")]
    WriteContention { key: AggregateKey, attempts: u32 },

    /// The log and the code disagree; never retried.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Storage failed after retries.
    #[error("Storage error: {0}")]
    Storage(#[source] EventLogError),
}

impl<R> CommandError<R> {
    /// True for outcomes caused by the command itself rather than by the
    /// infrastructure.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            CommandError::IncorrectRevision { .. }
                | CommandError::Rejected(_)
                | CommandError::Unauthorized { .. }
                | CommandError::QuotaReached { .. }
        )
    }

    /// True for failures the caller cannot fix by changing the command.
    pub fn is_infrastructure(&self) -> bool {
        !self.is_rejection()
    }

    /// Returns the entity rejection, if that is what this error is.
    pub fn rejection(&self) -> Option<&R> {
        match self {
            CommandError::Rejected(r) => Some(r),
            _ => None,
        }
    }

    /// Wraps an entity rejection.
    pub fn rejected(rejection: R) -> Self {
        CommandError::Rejected(rejection)
    }
}

impl<R> From<EventLogError> for CommandError<R> {
    fn from(e: EventLogError) -> Self {
        match e {
            EventLogError::InvariantViolation(reason) => CommandError::InvariantViolation(reason),
            other => CommandError::Storage(other),
        }
    }
}

impl<R> From<FetchError> for CommandError<R> {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::InvariantViolation(reason) => CommandError::InvariantViolation(reason),
            FetchError::Storage(e) => CommandError::Storage(e),
            other => CommandError::InvariantViolation(other.to_string()),
        }
    }
}

/// Errors returned by queries.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("'{key}' was not found")]
    NotFound { key: AggregateKey },

    #[error("Revision '{requested}' of '{key}' was not found, latest is '{latest}'")]
    RevisionNotFound {
        key: AggregateKey,
        requested: Revision,
        latest: Revision,
    },

    #[error("Tag '{tag}' was not found on '{key}'")]
    TagNotFound { key: AggregateKey, tag: String },

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Storage error: {0}")]
    Storage(#[source] EventLogError),
}

impl FetchError {
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            FetchError::InvariantViolation(_) | FetchError::Storage(_)
        )
    }
}

impl From<EventLogError> for FetchError {
    fn from(e: EventLogError) -> Self {
        match e {
            EventLogError::InvariantViolation(reason) => FetchError::InvariantViolation(reason),
            EventLogError::RevisionNotFound { key, latest, .. } if latest == Revision::initial() => {
                FetchError::NotFound { key }
            }
            EventLogError::RevisionNotFound {
                key,
                requested,
                latest,
            } => FetchError::RevisionNotFound {
                key,
                requested,
                latest,
            },
            other => FetchError::Storage(other),
        }
    }
}

/// Failure of a post-commit hook. Never rolls back the committed event.
#[derive(Debug, Clone, Error)]
pub enum HookError {
    #[error("{0}")]
    Failed(String),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Label;

    fn key() -> AggregateKey {
        AggregateKey::organization(&Label::new("org").unwrap())
    }

    #[test]
    fn classification_separates_rejections_from_infrastructure() {
        let stale: CommandError<std::io::Error> = CommandError::IncorrectRevision {
            key: key(),
            provided: Revision::new(1),
            expected: Revision::new(2),
        };
        assert!(stale.is_rejection());

        let contention: CommandError<std::io::Error> = CommandError::WriteContention {
            key: key(),
            attempts: 3,
        };
        assert!(contention.is_infrastructure());

        let storage: CommandError<std::io::Error> =
            EventLogError::Unavailable { attempts: 6, reason: "down".into() }.into();
        assert!(storage.is_infrastructure());
    }

    #[test]
    fn incorrect_revision_message_names_both_revisions() {
        let err: CommandError<std::io::Error> = CommandError::IncorrectRevision {
            key: key(),
            provided: Revision::new(1),
            expected: Revision::new(2),
        };
        assert_eq!(
            err.to_string(),
            "Incorrect revision '1' provided for 'organization:/:org', expected '2'"
        );
    }

    #[test]
    fn revision_not_found_on_missing_aggregate_is_not_found() {
        let err: FetchError = EventLogError::RevisionNotFound {
            key: key(),
            requested: Revision::new(1),
            latest: Revision::initial(),
        }
        .into();
        assert!(matches!(err, FetchError::NotFound { .. }));
    }
}
