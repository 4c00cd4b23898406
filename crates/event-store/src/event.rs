use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AggregateKey, Subject};

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an event ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-aggregate event counter, used for optimistic concurrency control.
///
/// Revision 0 means the aggregate has no events. The first event is
/// revision 1 and each following event increments it by exactly one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Revision(i64);

impl Revision {
    /// Creates a revision from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Revision of an aggregate without events.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Revision of the first event.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next revision.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw revision value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Revision {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Revision> for i64 {
    fn from(revision: Revision) -> Self {
        revision.0
    }
}

/// Position of an event in the global append order of the log.
///
/// Offsets are assigned from 1 and never reused. [`Offset::start`] (0)
/// positions a reader before the first event.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Offset(i64);

impl Offset {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// The position before the first event.
    pub fn start() -> Self {
        Self(0)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Offset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Offset {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// An immutable fact appended to the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier for this event.
    pub event_id: EventId,

    /// The type of the event (e.g. "ResourceCreated").
    pub event_type: String,

    /// The aggregate this event belongs to.
    pub key: AggregateKey,

    /// The revision of the aggregate after this event.
    pub revision: Revision,

    /// When the event happened.
    pub instant: DateTime<Utc>,

    /// Who caused the event.
    pub subject: Subject,

    /// The event payload as JSON.
    pub payload: serde_json::Value,
}

impl Event {
    /// Creates a new event builder.
    pub fn builder() -> EventBuilder {
        EventBuilder::default()
    }
}

/// Builder for constructing events.
#[derive(Debug, Default)]
pub struct EventBuilder {
    event_id: Option<EventId>,
    event_type: Option<String>,
    key: Option<AggregateKey>,
    revision: Option<Revision>,
    instant: Option<DateTime<Utc>>,
    subject: Option<Subject>,
    payload: Option<serde_json::Value>,
}

impl EventBuilder {
    /// Sets the event ID. If not set, a new ID will be generated.
    pub fn event_id(mut self, id: EventId) -> Self {
        self.event_id = Some(id);
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn key(mut self, key: AggregateKey) -> Self {
        self.key = Some(key);
        self
    }

    pub fn revision(mut self, revision: Revision) -> Self {
        self.revision = Some(revision);
        self
    }

    /// Sets the instant. If not set, the current time will be used.
    pub fn instant(mut self, instant: DateTime<Utc>) -> Self {
        self.instant = Some(instant);
        self
    }

    /// Sets the subject. If not set, the event is attributed to anonymous.
    pub fn subject(mut self, subject: Subject) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Sets the payload from a serializable value.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self, serde_json::Error> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Sets the payload from a raw JSON value.
    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Builds the event.
    ///
    /// # Panics
    ///
    /// Panics if required fields (event_type, key, revision, payload) are not set.
    pub fn build(self) -> Event {
        self.try_build()
            .expect("event_type, key, revision and payload are required")
    }

    /// Tries to build the event, returning None if required fields are missing.
    pub fn try_build(self) -> Option<Event> {
        Some(Event {
            event_id: self.event_id.unwrap_or_default(),
            event_type: self.event_type?,
            key: self.key?,
            revision: self.revision?,
            instant: self.instant.unwrap_or_else(Utc::now),
            subject: self.subject.unwrap_or(Subject::Anonymous),
            payload: self.payload?,
        })
    }
}

/// An event together with its global offset: the unit delivered to stream
/// consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub offset: Offset,
    pub event: Event,
}

impl Envelope {
    pub fn new(offset: Offset, event: Event) -> Self {
        Self { offset, event }
    }

    pub fn key(&self) -> &AggregateKey {
        &self.event.key
    }

    pub fn revision(&self) -> Revision {
        self.event.revision
    }

    pub fn event_type(&self) -> &str {
        &self.event.event_type
    }
}
