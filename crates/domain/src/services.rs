//! Construction of the coordinators and services over one event log.

use std::sync::Arc;

use event_store::EventLog;

use crate::acls::{AclPermissions, AclService, Acls};
use crate::coordinator::{CoordinatorConfig, WriteCoordinator};
use crate::organizations::{OrganizationService, Organizations};
use crate::permissions::{AllowAll, PermissionCheck};
use crate::projects::{ProjectService, Projects};
use crate::quotas::{CacheQuotas, QuotaCheck, QuotaConfig};
use crate::resolvers::{DefaultResolverHook, Resolution, ResolverService, Resolvers};
use crate::resources::{ResourceService, Resources};

/// How permissions are decided.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Authorization {
    /// Every caller may do everything.
    #[default]
    AllowAll,
    /// Permissions come from the ACLs stored in the log.
    Acls,
}

#[derive(Debug, Clone, Default)]
pub struct DomainConfig {
    pub coordinator: CoordinatorConfig,
    pub quotas: QuotaConfig,
    pub authorization: Authorization,
}

/// Every service of the domain, sharing one log, one cache per entity kind
/// and one permission check.
pub struct Services<L> {
    pub log: L,
    pub organizations: OrganizationService<L>,
    pub projects: ProjectService<L>,
    pub resolvers: ResolverService<L>,
    pub resources: ResourceService<L>,
    pub acls: AclService<L>,
    pub resolution: Arc<Resolution<L>>,
    pub permissions: Arc<dyn PermissionCheck>,
}

impl<L> Clone for Services<L>
where
    L: Clone,
{
    fn clone(&self) -> Self {
        Self {
            log: self.log.clone(),
            organizations: self.organizations.clone(),
            projects: self.projects.clone(),
            resolvers: self.resolvers.clone(),
            resources: self.resources.clone(),
            acls: self.acls.clone(),
            resolution: self.resolution.clone(),
            permissions: self.permissions.clone(),
        }
    }
}

impl<L> Services<L>
where
    L: EventLog + Clone + 'static,
{
    pub fn new(log: L, config: DomainConfig) -> Self {
        let acl_coordinator = Arc::new(WriteCoordinator::<L, Acls>::new(
            log.clone(),
            config.coordinator.clone(),
        ));
        let permissions: Arc<dyn PermissionCheck> = match config.authorization {
            Authorization::AllowAll => Arc::new(AllowAll),
            Authorization::Acls => Arc::new(AclPermissions::new(acl_coordinator.clone())),
        };

        let organizations = Arc::new(WriteCoordinator::<L, Organizations>::new(
            log.clone(),
            config.coordinator.clone(),
        ));
        let resolvers = Arc::new(WriteCoordinator::<L, Resolvers>::new(
            log.clone(),
            config.coordinator.clone(),
        ));
        let projects = Arc::new(
            WriteCoordinator::<L, Projects>::new(log.clone(), config.coordinator.clone())
                .with_hook(Arc::new(DefaultResolverHook::new(resolvers.clone()))),
        );
        let resources = Arc::new(WriteCoordinator::<L, Resources>::new(
            log.clone(),
            config.coordinator.clone(),
        ));

        let quotas: Arc<dyn QuotaCheck> = Arc::new(CacheQuotas::new(
            projects.cache().clone(),
            resources.cache().clone(),
            config.quotas,
        ));

        let resolver_service =
            ResolverService::new(resolvers, projects.clone(), permissions.clone());
        let resource_service = ResourceService::new(
            resources,
            projects.clone(),
            permissions.clone(),
            quotas.clone(),
        );
        let resolution = Arc::new(Resolution::new(
            resolver_service.clone(),
            resource_service.clone(),
            permissions.clone(),
        ));

        Self {
            organizations: OrganizationService::new(organizations.clone(), permissions.clone()),
            projects: ProjectService::new(projects, organizations, permissions.clone(), quotas),
            resolvers: resolver_service,
            resources: resource_service,
            acls: AclService::new(acl_coordinator, permissions.clone()),
            resolution,
            permissions,
            log,
        }
    }
}
