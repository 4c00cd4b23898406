//! Resolver endpoints and reference resolution.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::permission::resolvers;
use common::{Iri, Label, ProjectRef, Scope};
use domain::Page;
use domain::resolvers::{Resolved, Resolver, ResolverValue};
use event_store::{EventLog, Revision};
use serde::Deserialize;

use super::{AppState, AtQuery, CurrentCaller, ListQuery, RevQuery, authorize_read};
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreateResolverRequest {
    #[serde(rename = "@id")]
    pub id: Iri,
    pub value: ResolverValue,
}

/// POST /resolvers/{org}/{project}
#[tracing::instrument(skip(state, req, caller), fields(id = %req.id))]
pub async fn create<L: EventLog + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    CurrentCaller(caller): CurrentCaller,
    Path((org, project)): Path<(Label, Label)>,
    Json(req): Json<CreateResolverRequest>,
) -> Result<(StatusCode, Json<Resolver>), ApiError> {
    let committed = state
        .services
        .resolvers
        .create(&ProjectRef::new(org, project), req.id, req.value, &caller)
        .await?;
    Ok((StatusCode::CREATED, Json(committed.state)))
}

/// GET /resolvers/{org}/{project}/{id}
#[tracing::instrument(skip(state, caller))]
pub async fn fetch<L: EventLog + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    CurrentCaller(caller): CurrentCaller,
    Path((org, project, id)): Path<(Label, Label, Iri)>,
    Query(at): Query<AtQuery>,
) -> Result<Json<Resolver>, ApiError> {
    let project = ProjectRef::new(org, project);
    authorize_read(&state, &caller, &Scope::Project(project.clone()), resolvers::read()).await?;
    let service = &state.services.resolvers;
    let resolver = match at.rev {
        Some(rev) => service.fetch_at(&project, &id, Revision::new(rev)).await?,
        None => service.fetch(&project, &id).await?,
    };
    Ok(Json(resolver))
}

/// GET /resolvers/{org}/{project}
#[tracing::instrument(skip(state, caller))]
pub async fn list<L: EventLog + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    CurrentCaller(caller): CurrentCaller,
    Path((org, project)): Path<(Label, Label)>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<Resolver>>, ApiError> {
    let project = ProjectRef::new(org, project);
    authorize_read(&state, &caller, &Scope::Project(project.clone()), resolvers::read()).await?;
    Ok(Json(
        state
            .services
            .resolvers
            .list(&project, query.pagination(), query.deprecated)
            .await,
    ))
}

/// PUT /resolvers/{org}/{project}/{id}?rev=N
#[tracing::instrument(skip(state, value, caller))]
pub async fn update<L: EventLog + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    CurrentCaller(caller): CurrentCaller,
    Path((org, project, id)): Path<(Label, Label, Iri)>,
    Query(rev): Query<RevQuery>,
    Json(value): Json<ResolverValue>,
) -> Result<Json<Resolver>, ApiError> {
    let committed = state
        .services
        .resolvers
        .update(&ProjectRef::new(org, project), &id, rev.revision(), value, &caller)
        .await?;
    Ok(Json(committed.state))
}

/// DELETE /resolvers/{org}/{project}/{id}?rev=N: deprecates the resolver.
#[tracing::instrument(skip(state, caller))]
pub async fn deprecate<L: EventLog + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    CurrentCaller(caller): CurrentCaller,
    Path((org, project, id)): Path<(Label, Label, Iri)>,
    Query(rev): Query<RevQuery>,
) -> Result<Json<Resolver>, ApiError> {
    let committed = state
        .services
        .resolvers
        .deprecate(&ProjectRef::new(org, project), &id, rev.revision(), &caller)
        .await?;
    Ok(Json(committed.state))
}

/// GET /resolve/{org}/{project}/{id}, optionally `?rev=N` or `?tag=T`.
///
/// Permissions are checked per target project by the resolution itself;
/// a failure lists every resolver tried and why it did not apply.
#[tracing::instrument(skip(state, caller))]
pub async fn resolve<L: EventLog + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    CurrentCaller(caller): CurrentCaller,
    Path((org, project, id)): Path<(Label, Label, Iri)>,
    Query(at): Query<AtQuery>,
) -> Result<Json<Resolved>, ApiError> {
    let reference = at.reference(id)?;
    let resolved = state
        .services
        .resolution
        .resolve(&ProjectRef::new(org, project), &reference, &caller)
        .await?;
    Ok(Json(resolved))
}
