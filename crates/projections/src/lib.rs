//! Read side of the log.
//!
//! This crate provides:
//! - [`Projection`] trait for folding envelopes into derived state
//! - [`ProjectionProcessor`] for feeding the log to projections
//! - [`CacheProjection`] to rebuild the domain's state caches at startup
//! - [`EventStreamer`] for scoped, resumable live subscriptions

pub mod cache;
pub mod error;
pub mod processor;
pub mod projection;
pub mod stream;

pub use cache::CacheProjection;
pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use stream::{EventStreamer, Phase, Subscription, SubscriptionScope};
