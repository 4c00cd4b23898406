//! Quota checkpoint.

use async_trait::async_trait;
use common::{EntityType, Scope};
use event_store::Result;

use crate::cache::StateCache;
use crate::entity::EntityState;
use crate::projects::Project;
use crate::resources::Resource;

/// Decides whether a scope may hold more entities of a type.
#[async_trait]
pub trait QuotaCheck: Send + Sync {
    async fn quota_reached(&self, scope: &Scope, entity_type: EntityType) -> Result<bool>;
}

/// Never reports a reached quota.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoQuotas;

#[async_trait]
impl QuotaCheck for NoQuotas {
    async fn quota_reached(&self, _: &Scope, _: EntityType) -> Result<bool> {
        Ok(false)
    }
}

/// Limits per scope; `None` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuotaConfig {
    pub projects_per_organization: Option<usize>,
    pub resources_per_project: Option<usize>,
}

/// Counts non-deprecated entities in the caches against [`QuotaConfig`].
#[derive(Clone)]
pub struct CacheQuotas {
    projects: StateCache<Project>,
    resources: StateCache<Resource>,
    config: QuotaConfig,
}

impl CacheQuotas {
    pub fn new(
        projects: StateCache<Project>,
        resources: StateCache<Resource>,
        config: QuotaConfig,
    ) -> Self {
        Self {
            projects,
            resources,
            config,
        }
    }
}

#[async_trait]
impl QuotaCheck for CacheQuotas {
    async fn quota_reached(&self, scope: &Scope, entity_type: EntityType) -> Result<bool> {
        let reached = match (entity_type, scope) {
            (EntityType::Project, Scope::Organization(org)) => match self.config.projects_per_organization {
                Some(limit) => {
                    let count = self
                        .projects
                        .count(|p| !p.deprecated() && &p.project.organization == org)
                        .await;
                    count >= limit
                }
                None => false,
            },
            (EntityType::Resource, Scope::Project(project)) => match self.config.resources_per_project {
                Some(limit) => {
                    let count = self
                        .resources
                        .count(|r| !r.deprecated() && &r.project == project)
                        .await;
                    count >= limit
                }
                None => false,
            },
            _ => false,
        };
        if reached {
            tracing::debug!(%scope, %entity_type, "quota reached");
        }
        Ok(reached)
    }
}
