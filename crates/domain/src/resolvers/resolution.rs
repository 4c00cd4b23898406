//! Resolution of resource references through a project's resolvers.

use std::collections::BTreeSet;
use std::sync::Arc;

use common::{Caller, Iri, Permission, ProjectRef, Scope, permission::resources};
use event_store::{EventLog, EventLogError};
use serde::Serialize;
use thiserror::Error;

use crate::error::FetchError;
use crate::permissions::PermissionCheck;
use crate::resources::{Resource, ResourceRef, ResourceService};

use super::{ResolverService, ResolverValue};

/// Name reported for the in-project attempt when the project has no
/// in-project resolver of its own.
pub const IN_PROJECT: &str = "in-project";

/// Why a resolver did not yield the resource from one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "@type")]
pub enum FailureReason {
    NotFound,
    /// The resource exists but none of its types is allowed by the resolver.
    TypeExcluded { types: BTreeSet<Iri> },
    Unauthorized { permission: Permission },
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::NotFound => f.write_str("not found"),
            FailureReason::TypeExcluded { .. } => f.write_str("type excluded"),
            FailureReason::Unauthorized { permission } => {
                write!(f, "unauthorized, '{permission}' is required")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolverFailure {
    pub project: ProjectRef,
    pub reason: FailureReason,
}

/// Everything one resolver tried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolverAttempt {
    pub resolver: String,
    pub failures: Vec<ResolverFailure>,
}

/// The resolvers tried, in order, with the reason each one failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionReport {
    pub attempts: Vec<ResolverAttempt>,
}

impl std::fmt::Display for ResolutionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for attempt in &self.attempts {
            for failure in &attempt.failures {
                if !first {
                    f.write_str("; ")?;
                }
                first = false;
                write!(
                    f,
                    "resolver '{}' in '{}': {}",
                    attempt.resolver, failure.project, failure.reason
                )?;
            }
        }
        if first {
            f.write_str("no resolver was tried")?;
        }
        Ok(())
    }
}

/// A successfully resolved reference.
#[derive(Debug, Clone, Serialize)]
pub struct Resolved {
    pub project: ProjectRef,
    pub resolver: String,
    pub resource: Resource,
    /// Failures of the resolvers tried before the one that succeeded.
    pub report: ResolutionReport,
}

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("Reference '{reference}' could not be resolved from '{project}': {report}")]
    NotResolved {
        project: ProjectRef,
        reference: ResourceRef,
        report: ResolutionReport,
    },

    #[error(transparent)]
    Fetch(FetchError),

    #[error("Storage error: {0}")]
    Storage(#[source] EventLogError),
}

impl ResolutionError {
    pub fn is_infrastructure(&self) -> bool {
        !matches!(self, ResolutionError::NotResolved { .. })
    }
}

/// One resolver in resolution order, with the caller it reads as.
struct Candidate {
    name: String,
    projects: Vec<ProjectRef>,
    types: BTreeSet<Iri>,
    caller: Caller,
}

/// Resolves references through the in-project resolver first, then through
/// the active cross-project resolvers by ascending priority and id.
///
/// For each target project the caller's read permission is checked before
/// the resource is looked up, so an unauthorized caller learns nothing about
/// the resource's existence.
pub struct Resolution<L> {
    resolvers: ResolverService<L>,
    resources: ResourceService<L>,
    permissions: Arc<dyn PermissionCheck>,
}

impl<L: EventLog> Resolution<L> {
    pub fn new(
        resolvers: ResolverService<L>,
        resources: ResourceService<L>,
        permissions: Arc<dyn PermissionCheck>,
    ) -> Self {
        Self {
            resolvers,
            resources,
            permissions,
        }
    }

    async fn candidates(&self, project: &ProjectRef, caller: &Caller) -> Vec<Candidate> {
        let active = self.resolvers.active(project).await;

        let in_project = active
            .iter()
            .find(|r| r.value.is_in_project())
            .map_or_else(|| IN_PROJECT.to_string(), |r| r.id.to_string());
        let mut candidates = vec![Candidate {
            name: in_project,
            projects: vec![project.clone()],
            types: BTreeSet::new(),
            caller: caller.clone(),
        }];

        candidates.extend(active.into_iter().filter_map(|r| match r.value {
            ResolverValue::CrossProject {
                projects,
                resource_types,
                identities,
                ..
            } => Some(Candidate {
                name: r.id.to_string(),
                projects,
                types: resource_types,
                caller: identities.effective_caller(caller),
            }),
            ResolverValue::InProject { .. } => None,
        }));
        candidates
    }

    #[tracing::instrument(skip(self, caller), fields(subject = %caller.subject))]
    pub async fn resolve(
        &self,
        project: &ProjectRef,
        reference: &ResourceRef,
        caller: &Caller,
    ) -> Result<Resolved, ResolutionError> {
        let mut report = ResolutionReport::default();

        for candidate in self.candidates(project, caller).await {
            let mut failures = Vec::new();
            for target in &candidate.projects {
                match self.attempt(target, reference, &candidate).await? {
                    Ok(resource) => {
                        tracing::debug!(resolver = %candidate.name, %target, "reference resolved");
                        if !failures.is_empty() {
                            report.attempts.push(ResolverAttempt {
                                resolver: candidate.name.clone(),
                                failures,
                            });
                        }
                        return Ok(Resolved {
                            project: target.clone(),
                            resolver: candidate.name,
                            resource,
                            report,
                        });
                    }
                    Err(reason) => failures.push(ResolverFailure {
                        project: target.clone(),
                        reason,
                    }),
                }
            }
            report.attempts.push(ResolverAttempt {
                resolver: candidate.name,
                failures,
            });
        }

        tracing::debug!(%report, "reference not resolved");
        Err(ResolutionError::NotResolved {
            project: project.clone(),
            reference: reference.clone(),
            report,
        })
    }

    async fn attempt(
        &self,
        target: &ProjectRef,
        reference: &ResourceRef,
        candidate: &Candidate,
    ) -> Result<Result<Resource, FailureReason>, ResolutionError> {
        let permission = resources::read();
        let allowed = self
            .permissions
            .has_permission(&candidate.caller, &Scope::Project(target.clone()), &permission)
            .await
            .map_err(ResolutionError::Storage)?;
        if !allowed {
            return Ok(Err(FailureReason::Unauthorized { permission }));
        }

        let resource = match self.resources.fetch_ref(target, reference).await {
            Ok(resource) => resource,
            Err(e) if e.is_infrastructure() => return Err(ResolutionError::Fetch(e)),
            Err(_) => return Ok(Err(FailureReason::NotFound)),
        };

        if !candidate.types.is_empty() && !resource.has_any_type(&candidate.types) {
            return Ok(Err(FailureReason::TypeExcluded {
                types: resource.types,
            }));
        }
        Ok(Ok(resource))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_lists_every_failure_in_order() {
        let project = |p: &str| ProjectRef::unsafe_from("acme", p).unwrap();
        let report = ResolutionReport {
            attempts: vec![
                ResolverAttempt {
                    resolver: IN_PROJECT.to_string(),
                    failures: vec![ResolverFailure {
                        project: project("data"),
                        reason: FailureReason::NotFound,
                    }],
                },
                ResolverAttempt {
                    resolver: "urn:resolver:shared".to_string(),
                    failures: vec![ResolverFailure {
                        project: project("shared"),
                        reason: FailureReason::Unauthorized {
                            permission: resources::read(),
                        },
                    }],
                },
            ],
        };

        assert_eq!(
            report.to_string(),
            "resolver 'in-project' in 'acme/data': not found; \
             resolver 'urn:resolver:shared' in 'acme/shared': unauthorized, 'resources/read' is required"
        );
        assert_eq!(ResolutionReport::default().to_string(), "no resolver was tried");
    }
}
