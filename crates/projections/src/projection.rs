//! Core projection trait and position tracking.

use async_trait::async_trait;
use event_store::{Envelope, Offset};

use crate::Result;

/// Tracks how far a projection has read the log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionPosition {
    /// Offset of the last envelope handled.
    pub offset: Offset,
    /// Number of envelopes handled.
    pub events_processed: u64,
}

impl ProjectionPosition {
    /// Creates a position before the first envelope.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Moves the position past `offset`.
    pub fn advance(&self, offset: Offset) -> Self {
        Self {
            offset,
            events_processed: self.events_processed + 1,
        }
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "position({}, {})", self.offset, self.events_processed)
    }
}

/// A projection that folds log envelopes into a derived view.
#[async_trait]
pub trait Projection: Send + Sync {
    /// Returns the name of this projection.
    fn name(&self) -> &'static str;

    /// Handles one envelope. Envelopes arrive in offset order.
    async fn handle(&self, envelope: &Envelope) -> Result<()>;

    /// Returns the current position of this projection.
    async fn position(&self) -> ProjectionPosition;

    /// Resets the projection to its initial state.
    async fn reset(&self) -> Result<()>;
}
