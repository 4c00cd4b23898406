//! Domain layer of the resource-management core.
//!
//! This crate provides:
//! - the [`Entity`] contract every entity kind implements (evaluate / next)
//! - the [`WriteCoordinator`], which serializes commands per aggregate key,
//!   appends their events and writes the new state through to a [`StateCache`]
//! - the collaborator seams: [`PermissionCheck`], [`QuotaCheck`] and [`CommitHook`]
//! - the entity kinds: organizations, projects, resolvers, resources and ACLs
//! - reference resolution across projects through resolvers

pub mod acls;
pub mod cache;
pub mod coordinator;
pub mod entity;
pub mod error;
pub mod hooks;
pub mod locks;
pub mod organizations;
pub mod permissions;
pub mod projects;
pub mod quotas;
pub mod resolvers;
pub mod resources;
pub mod services;

pub use cache::{Page, Pagination, StateCache};
pub use coordinator::{Command, Committed, CoordinatorConfig, ExpectedRevision, WriteCoordinator};
pub use entity::{DomainEvent, Entity, EntityState, EventMeta, fold};
pub use error::{CommandError, FetchError, HookError};
pub use hooks::{CommitHook, HookFailure, HookReport};
pub use permissions::{AllowAll, PermissionCheck};
pub use quotas::{CacheQuotas, NoQuotas, QuotaCheck, QuotaConfig};
pub use services::{Authorization, DomainConfig, Services};
