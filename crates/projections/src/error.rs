//! Projection error types.

use common::AggregateKey;
use event_store::{EventLogError, Revision};
use thiserror::Error;

/// Errors raised while reading the log into projections or streams.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("Event log error: {0}")]
    EventLog(#[from] EventLogError),

    /// The log skipped a revision of `key`; the cache cannot be trusted.
    #[error("Cannot apply revision {revision} of '{key}' on top of revision {current}")]
    RevisionGap {
        key: AggregateKey,
        current: Revision,
        revision: Revision,
    },

    #[error("Projection error: {0}")]
    Projection(String),
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
