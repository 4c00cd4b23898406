//! Core entity and domain event traits.

use chrono::{DateTime, Utc};
use common::{AggregateKey, EntityType, Subject};
use event_store::{Event, EventLogError, Revision};
use serde::{Serialize, de::DeserializeOwned};

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and should be named in past tense.
pub trait DomainEvent:
    Serialize + DeserializeOwned + Send + Sync + Clone + std::fmt::Debug + 'static
{
    /// Returns the event type name stored alongside the payload in the log.
    fn event_type(&self) -> &'static str;
}

/// Log-level facts about an event that the transition function may record in
/// the state it produces.
#[derive(Debug, Clone, PartialEq)]
pub struct EventMeta {
    pub revision: Revision,
    pub instant: DateTime<Utc>,
    pub subject: Subject,
}

impl From<&Event> for EventMeta {
    fn from(event: &Event) -> Self {
        Self {
            revision: event.revision,
            instant: event.instant,
            subject: event.subject.clone(),
        }
    }
}

/// Materialized state of one aggregate at some revision.
pub trait EntityState: Clone + std::fmt::Debug + Serialize + Send + Sync + 'static {
    /// The key of the aggregate this state belongs to.
    fn key(&self) -> AggregateKey;

    /// The revision this state was computed at.
    fn revision(&self) -> Revision;

    /// Whether the aggregate reached its terminal state.
    fn deprecated(&self) -> bool;
}

/// One kind of event-sourced entity.
///
/// Each kind supplies its own command, event, state and rejection types behind
/// this contract. Both functions are pure: any lookup they depend on is
/// resolved by the caller beforehand. `None` stands for the initial state of
/// an aggregate without events.
pub trait Entity: Send + Sync + 'static {
    /// The entity type stored in the keys of this kind.
    const ENTITY_TYPE: EntityType;

    type State: EntityState;
    type Command: std::fmt::Debug + Send + Sync;
    type Event: DomainEvent;
    type Rejection: std::error::Error + Send + Sync + 'static;

    /// Turns a command for `key` into the single event it produces, or
    /// rejects it.
    fn evaluate(
        key: &AggregateKey,
        state: Option<&Self::State>,
        command: &Self::Command,
    ) -> Result<Self::Event, Self::Rejection>;

    /// Folds an event onto the state.
    ///
    /// Returns `None` when the event cannot follow the given state, which
    /// means the log and the code disagree.
    fn next(
        state: Option<Self::State>,
        event: &Self::Event,
        meta: &EventMeta,
    ) -> Option<Self::State>;
}

/// Applies an already decoded event of entity `E`.
///
/// An impossible transition is an invariant violation: it aborts instead of
/// skipping the event.
pub fn apply<E: Entity>(
    state: Option<E::State>,
    event: &E::Event,
    meta: &EventMeta,
    key: &AggregateKey,
) -> Result<E::State, EventLogError> {
    let had_state = state.is_some();
    E::next(state, event, meta).ok_or_else(|| {
        EventLogError::InvariantViolation(format!(
            "event '{}' at revision {} of {key} cannot be applied to {} state",
            event.event_type(),
            meta.revision,
            if had_state { "the current" } else { "an initial" }
        ))
    })
}

/// Folds a stored log event onto the state of entity `E`.
///
/// Payloads the entity does not know are invariant violations.
pub fn fold<E: Entity>(
    state: Option<E::State>,
    event: &Event,
) -> Result<Option<E::State>, EventLogError> {
    let decoded: E::Event = serde_json::from_value(event.payload.clone()).map_err(|e| {
        EventLogError::InvariantViolation(format!(
            "event '{}' at revision {} of {} cannot be decoded: {e}",
            event.event_type, event.revision, event.key
        ))
    })?;
    apply::<E>(state, &decoded, &EventMeta::from(event), &event.key).map(Some)
}
