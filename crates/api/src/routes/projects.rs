//! Project endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::permission::projects;
use common::{Label, ProjectRef, Scope};
use domain::Page;
use domain::projects::{Project, ProjectFields};
use event_store::{EventLog, Revision};

use super::{AppState, AtQuery, CurrentCaller, ListQuery, RevQuery, authorize_read};
use crate::error::ApiError;

/// POST /projects/{org}/{project}
#[tracing::instrument(skip(state, fields, caller))]
pub async fn create<L: EventLog + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    CurrentCaller(caller): CurrentCaller,
    Path((org, project)): Path<(Label, Label)>,
    Json(fields): Json<ProjectFields>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let committed = state
        .services
        .projects
        .create(ProjectRef::new(org, project), fields, &caller)
        .await?;
    Ok((StatusCode::CREATED, Json(committed.state)))
}

/// GET /projects/{org}/{project}
#[tracing::instrument(skip(state, caller))]
pub async fn fetch<L: EventLog + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    CurrentCaller(caller): CurrentCaller,
    Path((org, project)): Path<(Label, Label)>,
    Query(at): Query<AtQuery>,
) -> Result<Json<Project>, ApiError> {
    let project = ProjectRef::new(org, project);
    let address = Scope::Project(project.clone());
    authorize_read(&state, &caller, &address, projects::read()).await?;
    let projects = &state.services.projects;
    let found = match at.rev {
        Some(rev) => projects.fetch_at(&project, Revision::new(rev)).await?,
        None => projects.fetch(&project).await?,
    };
    Ok(Json(found))
}

/// GET /projects/{org}
#[tracing::instrument(skip(state, caller))]
pub async fn list<L: EventLog + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    CurrentCaller(caller): CurrentCaller,
    Path(org): Path<Label>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<Project>>, ApiError> {
    let address = Scope::Organization(org.clone());
    authorize_read(&state, &caller, &address, projects::read()).await?;
    Ok(Json(
        state
            .services
            .projects
            .list(Some(&org), query.pagination(), query.deprecated)
            .await,
    ))
}

/// PUT /projects/{org}/{project}?rev=N
#[tracing::instrument(skip(state, fields, caller))]
pub async fn update<L: EventLog + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    CurrentCaller(caller): CurrentCaller,
    Path((org, project)): Path<(Label, Label)>,
    Query(rev): Query<RevQuery>,
    Json(fields): Json<ProjectFields>,
) -> Result<Json<Project>, ApiError> {
    let committed = state
        .services
        .projects
        .update(&ProjectRef::new(org, project), rev.revision(), fields, &caller)
        .await?;
    Ok(Json(committed.state))
}

/// DELETE /projects/{org}/{project}?rev=N: deprecates the project.
#[tracing::instrument(skip(state, caller))]
pub async fn deprecate<L: EventLog + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    CurrentCaller(caller): CurrentCaller,
    Path((org, project)): Path<(Label, Label)>,
    Query(rev): Query<RevQuery>,
) -> Result<Json<Project>, ApiError> {
    let committed = state
        .services
        .projects
        .deprecate(&ProjectRef::new(org, project), rev.revision(), &caller)
        .await?;
    Ok(Json(committed.state))
}
