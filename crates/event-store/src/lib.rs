//! Durable, append-only event log.
//!
//! Every aggregate owns one ordered partition of events addressed by its
//! [`AggregateKey`]; every event additionally receives a global [`Offset`]
//! and is indexed under a set of [`Tag`]s so consumers can replay and tail
//! the log by tenant.

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod retry;
pub mod store;
pub mod tag;

pub use common::{AggregateKey, Subject};
pub use error::{EventLogError, Result};
pub use event::{Envelope, Event, EventBuilder, EventId, Offset, Revision};
pub use memory::InMemoryEventLog;
pub use postgres::{PostgresConfig, PostgresEventLog};
pub use retry::RetryPolicy;
pub use store::{EnvelopeStream, EventLog, EventLogExt, replay};
pub use tag::Tag;
