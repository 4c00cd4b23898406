use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{AggregateKey, Envelope, Event, EventLogError, Offset, Result, Revision, Tag};

/// A lazy sequence of envelopes in offset order.
pub type EnvelopeStream = Pin<Box<dyn Stream<Item = Result<Envelope>> + Send>>;

/// Core trait for event log implementations.
///
/// The log is the single source of truth: one append-only partition per
/// aggregate, plus tag indexes over the global append order.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Appends an event to its aggregate's partition.
    ///
    /// Fails with `RevisionConflict` if the stored revision of the aggregate
    /// differs from `expected` at commit time. The event itself must carry
    /// revision `expected + 1`.
    async fn append(&self, event: Event, expected: Revision) -> Result<Envelope>;

    /// Retrieves all events of an aggregate in revision order.
    async fn events(&self, key: &AggregateKey) -> Result<Vec<Envelope>>;

    /// Retrieves the events of an aggregate up to and including `revision`.
    async fn events_until(&self, key: &AggregateKey, revision: Revision) -> Result<Vec<Envelope>>;

    /// Gets the current revision of an aggregate, `Revision::initial()` if it
    /// has no events.
    async fn current_revision(&self, key: &AggregateKey) -> Result<Revision>;

    /// Offset of the last event indexed under `tag`, `Offset::start()` if none.
    async fn last_offset(&self, tag: &Tag) -> Result<Offset>;

    /// Finite replay of the events under `tag` with an offset greater than
    /// `from`, up to the position of the log when the call was made.
    async fn current_events_by_tag(&self, tag: &Tag, from: Offset) -> Result<EnvelopeStream>;

    /// Infinite replay of the events under `tag` with an offset greater than
    /// `from`, followed by a live tail of newly appended events.
    ///
    /// The switch from history to live tail is gapless and without
    /// duplicates. Dropping the stream releases the underlying cursor.
    async fn events_by_tag(&self, tag: &Tag, from: Offset) -> Result<EnvelopeStream>;
}

/// Extension trait providing state reconstruction on top of any log.
#[async_trait]
pub trait EventLogExt: EventLog {
    /// Appends a single event expecting the aggregate not to exist.
    async fn append_new(&self, event: Event) -> Result<Envelope> {
        self.append(event, Revision::initial()).await
    }

    /// Checks if an aggregate exists (has any events).
    async fn aggregate_exists(&self, key: &AggregateKey) -> Result<bool> {
        Ok(self.current_revision(key).await? > Revision::initial())
    }

    /// Folds all events of `key` onto `initial` and returns the resulting
    /// state together with the revision it corresponds to.
    async fn current_state<S, F>(
        &self,
        key: &AggregateKey,
        initial: S,
        next: F,
    ) -> Result<(S, Revision)>
    where
        S: Send + 'static,
        F: Fn(S, &Event) -> Result<S> + Send + Sync,
    {
        let envelopes = self.events(key).await?;
        let revision = envelopes
            .last()
            .map(Envelope::revision)
            .unwrap_or_default();
        let state = replay(key, initial, envelopes.iter().map(|e| &e.event), next)?;
        Ok((state, revision))
    }

    /// Folds the events of `key` up to `revision` onto `initial`.
    ///
    /// Fails with `RevisionNotFound` if `revision` is negative or beyond the
    /// aggregate's current revision.
    async fn state_at<S, F>(
        &self,
        key: &AggregateKey,
        revision: Revision,
        initial: S,
        next: F,
    ) -> Result<S>
    where
        S: Send + 'static,
        F: Fn(S, &Event) -> Result<S> + Send + Sync,
    {
        let latest = self.current_revision(key).await?;
        if revision < Revision::initial() || revision > latest {
            return Err(EventLogError::RevisionNotFound {
                key: key.clone(),
                requested: revision,
                latest,
            });
        }
        let envelopes = self.events_until(key, revision).await?;
        replay(key, initial, envelopes.iter().map(|e| &e.event), next)
    }
}

// Blanket implementation for all EventLog implementations
impl<T: EventLog + ?Sized> EventLogExt for T {}

/// Folds events onto `initial`, checking that revisions are contiguous from 1.
pub fn replay<'a, S, F>(
    key: &AggregateKey,
    initial: S,
    events: impl IntoIterator<Item = &'a Event>,
    next: F,
) -> Result<S>
where
    F: Fn(S, &Event) -> Result<S>,
{
    let mut state = initial;
    let mut expected = Revision::first();
    for event in events {
        if event.revision != expected {
            return Err(EventLogError::InvariantViolation(format!(
                "aggregate {key} has a revision gap: expected {expected}, found {}",
                event.revision
            )));
        }
        state = next(state, event)?;
        expected = expected.next();
    }
    Ok(state)
}

/// Validates an event before appending it with the given expectation.
pub fn validate_for_append(event: &Event, expected: Revision) -> Result<()> {
    if event.revision != expected.next() {
        return Err(EventLogError::InvariantViolation(format!(
            "event for {} carries revision {} but expected revision is {}",
            event.key, event.revision, expected
        )));
    }
    Ok(())
}
