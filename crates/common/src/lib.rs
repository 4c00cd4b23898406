//! Shared types for the resource-management core.
//!
//! Everything here is plain data: identifiers, the compound [`AggregateKey`]
//! that addresses one aggregate's event sequence, and the identities used by
//! permission checkpoints.

pub mod identity;
pub mod key;
pub mod permission;
pub mod types;

pub use identity::{Caller, Identity, Subject};
pub use key::{AggregateKey, EntityType, Scope};
pub use permission::Permission;
pub use types::{FormatError, Iri, Label, ProjectRef};
