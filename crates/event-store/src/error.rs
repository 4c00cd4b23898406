use thiserror::Error;

use crate::{AggregateKey, Revision};

/// Errors that can occur when interacting with the event log.
#[derive(Debug, Error)]
pub enum EventLogError {
    /// The stored revision of the aggregate did not match the expected one
    /// at commit time.
    #[error(
        "Revision conflict for aggregate {key}: expected revision {expected}, found {actual}"
    )]
    RevisionConflict {
        key: AggregateKey,
        expected: Revision,
        actual: Revision,
    },

    /// A point-in-time read asked for a revision the aggregate never reached.
    #[error("Revision {requested} not found for aggregate {key}, latest is {latest}")]
    RevisionNotFound {
        key: AggregateKey,
        requested: Revision,
        latest: Revision,
    },

    /// The log or the code reading it is inconsistent, e.g. a gap in the
    /// revision sequence or an event type the transition function does not
    /// know. Never retried.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Transient storage failures persisted after all retries.
    #[error("Storage unavailable after {attempts} attempts: {reason}")]
    Unavailable { attempts: u32, reason: String },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EventLogError {
    /// Returns true for storage failures that may succeed when retried:
    /// connection loss, I/O errors and pool timeouts.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EventLogError::Database(
                sqlx::Error::Io(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
            )
        )
    }
}

/// Result type for event log operations.
pub type Result<T> = std::result::Result<T, EventLogError>;
