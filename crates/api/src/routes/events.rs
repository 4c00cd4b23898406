//! Server-sent event streams over the log.
//!
//! Each event is rendered with `id` = log offset and `event` = event type,
//! so a reconnecting client resumes with the standard `Last-Event-ID` header.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use common::permission::resources;
use common::{AggregateKey, Caller, Iri, Label, ProjectRef, Scope};
use event_store::{EventLog, Offset};
use futures_util::{Stream, StreamExt};
use projections::SubscriptionScope;
use serde::Deserialize;

use super::{AppState, CurrentCaller, authorize_read};
use crate::error::ApiError;

pub const LAST_EVENT_ID: &str = "last-event-id";

/// Where a stream starts when no `Last-Event-ID` is sent.
#[derive(Debug, Default, Deserialize)]
pub struct OffsetQuery {
    pub offset: Option<i64>,
}

/// Events are delivered strictly after the returned offset.
fn start_offset(headers: &HeaderMap, query: &OffsetQuery) -> Result<Offset, ApiError> {
    if let Some(value) = headers.get(LAST_EVENT_ID) {
        return value
            .to_str()
            .ok()
            .and_then(|raw| raw.parse::<Offset>().ok())
            .ok_or_else(|| ApiError::BadRequest("Last-Event-ID must be a log offset".into()));
    }
    Ok(query.offset.map_or(Offset::start(), Offset::new))
}

async fn open<L: EventLog + Clone + 'static>(
    state: &AppState<L>,
    caller: &Caller,
    scope: SubscriptionScope,
    address: Scope,
    headers: &HeaderMap,
    query: &OffsetQuery,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>> + use<L>>, ApiError> {
    authorize_read(state, caller, &address, resources::read()).await?;
    let from = start_offset(headers, query)?;
    tracing::info!(%scope, %from, subject = %caller.subject, "event stream opened");

    let events = state.streamer.subscribe(scope, from).map(|item| match item {
        Ok(envelope) => Event::default()
            .id(envelope.offset.to_string())
            .event(envelope.event_type())
            .json_data(&envelope.event),
        Err(e) => {
            tracing::warn!(error = %e, "event stream failed");
            Err(axum::Error::new(e))
        }
    });
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// GET /events: every event of the log.
pub async fn global<L: EventLog + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    CurrentCaller(caller): CurrentCaller,
    headers: HeaderMap,
    Query(query): Query<OffsetQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    open(
        &state,
        &caller,
        SubscriptionScope::Global,
        Scope::Root,
        &headers,
        &query,
    )
    .await
}

/// GET /events/{org}: events of an organization and everything in it.
pub async fn organization<L: EventLog + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    CurrentCaller(caller): CurrentCaller,
    Path(org): Path<Label>,
    headers: HeaderMap,
    Query(query): Query<OffsetQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    open(
        &state,
        &caller,
        SubscriptionScope::Organization {
            organization: org.clone(),
        },
        Scope::Organization(org),
        &headers,
        &query,
    )
    .await
}

/// GET /events/{org}/{project}: events of a project and everything in it.
pub async fn project<L: EventLog + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    CurrentCaller(caller): CurrentCaller,
    Path((org, project)): Path<(Label, Label)>,
    headers: HeaderMap,
    Query(query): Query<OffsetQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let project = ProjectRef::new(org, project);
    open(
        &state,
        &caller,
        SubscriptionScope::Project {
            project: project.clone(),
        },
        Scope::Project(project),
        &headers,
        &query,
    )
    .await
}

/// GET /events/{org}/{project}/{id}: events of one resource.
pub async fn resource<L: EventLog + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    CurrentCaller(caller): CurrentCaller,
    Path((org, project, id)): Path<(Label, Label, Iri)>,
    headers: HeaderMap,
    Query(query): Query<OffsetQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let project = ProjectRef::new(org, project);
    open(
        &state,
        &caller,
        SubscriptionScope::Resource {
            key: AggregateKey::resource(&project, &id),
        },
        Scope::Project(project),
        &headers,
        &query,
    )
    .await
}
