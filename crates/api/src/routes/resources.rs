//! Resource endpoints.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::permission::resources;
use common::{Iri, Label, ProjectRef, Scope};
use domain::{Page, Pagination};
use domain::resources::Resource;
use event_store::{EventLog, Revision};
use serde::Deserialize;

use super::{AppState, AtQuery, CurrentCaller, RevQuery, authorize_read};
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreateResourceRequest {
    #[serde(rename = "@id")]
    pub id: Iri,
    #[serde(default)]
    pub types: BTreeSet<Iri>,
    pub source: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct UpdateResourceRequest {
    #[serde(default)]
    pub types: BTreeSet<Iri>,
    pub source: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct TagRequest {
    pub tag: String,
    pub rev: i64,
}

/// [`ListQuery`] plus an optional `type` filter.
#[derive(Debug, Deserialize)]
pub struct ResourceListQuery {
    #[serde(rename = "type")]
    pub resource_type: Option<Iri>,
    #[serde(default)]
    pub from: usize,
    #[serde(default = "default_size")]
    pub size: usize,
    #[serde(default)]
    pub deprecated: bool,
}

fn default_size() -> usize {
    Pagination::DEFAULT_SIZE
}

/// POST /resources/{org}/{project}
#[tracing::instrument(skip(state, req, caller), fields(id = %req.id))]
pub async fn create<L: EventLog + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    CurrentCaller(caller): CurrentCaller,
    Path((org, project)): Path<(Label, Label)>,
    Json(req): Json<CreateResourceRequest>,
) -> Result<(StatusCode, Json<Resource>), ApiError> {
    let committed = state
        .services
        .resources
        .create(
            &ProjectRef::new(org, project),
            req.id,
            req.types,
            req.source,
            &caller,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(committed.state)))
}

/// GET /resources/{org}/{project}/{id}, optionally `?rev=N` or `?tag=T`.
#[tracing::instrument(skip(state, caller))]
pub async fn fetch<L: EventLog + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    CurrentCaller(caller): CurrentCaller,
    Path((org, project, id)): Path<(Label, Label, Iri)>,
    Query(at): Query<AtQuery>,
) -> Result<Json<Resource>, ApiError> {
    let project = ProjectRef::new(org, project);
    let address = Scope::Project(project.clone());
    authorize_read(&state, &caller, &address, resources::read()).await?;
    let reference = at.reference(id)?;
    let resource = state
        .services
        .resources
        .fetch_ref(&project, &reference)
        .await?;
    Ok(Json(resource))
}

/// GET /resources/{org}/{project}
#[tracing::instrument(skip(state, caller))]
pub async fn list<L: EventLog + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    CurrentCaller(caller): CurrentCaller,
    Path((org, project)): Path<(Label, Label)>,
    Query(query): Query<ResourceListQuery>,
) -> Result<Json<Page<Resource>>, ApiError> {
    let project = ProjectRef::new(org, project);
    let address = Scope::Project(project.clone());
    authorize_read(&state, &caller, &address, resources::read()).await?;
    let types: BTreeSet<Iri> = query.resource_type.into_iter().collect();
    Ok(Json(
        state
            .services
            .resources
            .list(
                &project,
                &types,
                Pagination::new(query.from, query.size),
                query.deprecated,
            )
            .await,
    ))
}

/// PUT /resources/{org}/{project}/{id}?rev=N
#[tracing::instrument(skip(state, req, caller))]
pub async fn update<L: EventLog + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    CurrentCaller(caller): CurrentCaller,
    Path((org, project, id)): Path<(Label, Label, Iri)>,
    Query(rev): Query<RevQuery>,
    Json(req): Json<UpdateResourceRequest>,
) -> Result<Json<Resource>, ApiError> {
    let committed = state
        .services
        .resources
        .update(
            &ProjectRef::new(org, project),
            &id,
            rev.revision(),
            req.types,
            req.source,
            &caller,
        )
        .await?;
    Ok(Json(committed.state))
}

/// POST /resources/{org}/{project}/{id}/tags?rev=N
#[tracing::instrument(skip(state, req, caller))]
pub async fn tag<L: EventLog + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    CurrentCaller(caller): CurrentCaller,
    Path((org, project, id)): Path<(Label, Label, Iri)>,
    Query(rev): Query<RevQuery>,
    Json(req): Json<TagRequest>,
) -> Result<(StatusCode, Json<Resource>), ApiError> {
    let committed = state
        .services
        .resources
        .tag(
            &ProjectRef::new(org, project),
            &id,
            rev.revision(),
            req.tag,
            Revision::new(req.rev),
            &caller,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(committed.state)))
}

/// DELETE /resources/{org}/{project}/{id}/tags/{tag}?rev=N
#[tracing::instrument(skip(state, caller))]
pub async fn delete_tag<L: EventLog + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    CurrentCaller(caller): CurrentCaller,
    Path((org, project, id, tag)): Path<(Label, Label, Iri, String)>,
    Query(rev): Query<RevQuery>,
) -> Result<Json<Resource>, ApiError> {
    let committed = state
        .services
        .resources
        .delete_tag(&ProjectRef::new(org, project), &id, rev.revision(), tag, &caller)
        .await?;
    Ok(Json(committed.state))
}

/// DELETE /resources/{org}/{project}/{id}?rev=N: deprecates the resource.
#[tracing::instrument(skip(state, caller))]
pub async fn deprecate<L: EventLog + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    CurrentCaller(caller): CurrentCaller,
    Path((org, project, id)): Path<(Label, Label, Iri)>,
    Query(rev): Query<RevQuery>,
) -> Result<Json<Resource>, ApiError> {
    let committed = state
        .services
        .resources
        .deprecate(&ProjectRef::new(org, project), &id, rev.revision(), &caller)
        .await?;
    Ok(Json(committed.state))
}
