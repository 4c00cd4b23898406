//! Organization endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::permission::orgs;
use common::{Label, Scope};
use domain::organizations::Organization;
use event_store::{EventLog, Revision};
use serde::Deserialize;

use super::{AppState, AtQuery, CurrentCaller, RevQuery, authorize_read};
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct OrganizationRequest {
    pub label: Label,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DescriptionRequest {
    pub description: Option<String>,
}

/// POST /orgs
#[tracing::instrument(skip(state, req, caller))]
pub async fn create<L: EventLog + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    CurrentCaller(caller): CurrentCaller,
    Json(req): Json<OrganizationRequest>,
) -> Result<(StatusCode, Json<Organization>), ApiError> {
    let committed = state
        .services
        .organizations
        .create(req.label, req.description, &caller)
        .await?;
    Ok((StatusCode::CREATED, Json(committed.state)))
}

/// GET /orgs/{org}
#[tracing::instrument(skip(state, caller))]
pub async fn fetch<L: EventLog + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    CurrentCaller(caller): CurrentCaller,
    Path(label): Path<Label>,
    Query(at): Query<AtQuery>,
) -> Result<Json<Organization>, ApiError> {
    let address = Scope::Organization(label.clone());
    authorize_read(&state, &caller, &address, orgs::read()).await?;
    let organizations = &state.services.organizations;
    let organization = match at.rev {
        Some(rev) => organizations.fetch_at(&label, Revision::new(rev)).await?,
        None => organizations.fetch(&label).await?,
    };
    Ok(Json(organization))
}

/// PUT /orgs/{org}?rev=N
#[tracing::instrument(skip(state, req, caller))]
pub async fn update<L: EventLog + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    CurrentCaller(caller): CurrentCaller,
    Path(label): Path<Label>,
    Query(rev): Query<RevQuery>,
    Json(req): Json<DescriptionRequest>,
) -> Result<Json<Organization>, ApiError> {
    let committed = state
        .services
        .organizations
        .update(&label, rev.revision(), req.description, &caller)
        .await?;
    Ok(Json(committed.state))
}

/// DELETE /orgs/{org}?rev=N: deprecates the organization.
#[tracing::instrument(skip(state, caller))]
pub async fn deprecate<L: EventLog + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    CurrentCaller(caller): CurrentCaller,
    Path(label): Path<Label>,
    Query(rev): Query<RevQuery>,
) -> Result<Json<Organization>, ApiError> {
    let committed = state
        .services
        .organizations
        .deprecate(&label, rev.revision(), &caller)
        .await?;
    Ok(Json(committed.state))
}
