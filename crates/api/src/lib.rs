//! HTTP surface of the resource-management core.
//!
//! Provides REST endpoints for organizations, projects, resolvers and
//! resources, reference resolution, server-sent event streams, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use common::{Identity, Scope, Subject};
use domain::acls::{Acl, Acls};
use domain::organizations::Organizations;
use domain::projects::Projects;
use domain::resolvers::Resolvers;
use domain::resources::Resources;
use domain::{DomainConfig, Services};
use event_store::EventLog;
use metrics_exporter_prometheus::PrometheusHandle;
use projections::{CacheProjection, EventStreamer, ProjectionProcessor};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<L: EventLog + Clone + 'static>(state: Arc<AppState<L>>) -> Router {
    Router::new()
        .route("/health", get(routes::health::check))
        .route("/metrics", get(routes::metrics::get::<L>))
        .route("/orgs", post(routes::organizations::create::<L>))
        .route(
            "/orgs/{org}",
            get(routes::organizations::fetch::<L>)
                .put(routes::organizations::update::<L>)
                .delete(routes::organizations::deprecate::<L>),
        )
        .route("/projects/{org}", get(routes::projects::list::<L>))
        .route(
            "/projects/{org}/{project}",
            get(routes::projects::fetch::<L>)
                .post(routes::projects::create::<L>)
                .put(routes::projects::update::<L>)
                .delete(routes::projects::deprecate::<L>),
        )
        .route(
            "/resolvers/{org}/{project}",
            get(routes::resolvers::list::<L>).post(routes::resolvers::create::<L>),
        )
        .route(
            "/resolvers/{org}/{project}/{id}",
            get(routes::resolvers::fetch::<L>)
                .put(routes::resolvers::update::<L>)
                .delete(routes::resolvers::deprecate::<L>),
        )
        .route(
            "/resources/{org}/{project}",
            get(routes::resources::list::<L>).post(routes::resources::create::<L>),
        )
        .route(
            "/resources/{org}/{project}/{id}",
            get(routes::resources::fetch::<L>)
                .put(routes::resources::update::<L>)
                .delete(routes::resources::deprecate::<L>),
        )
        .route(
            "/resources/{org}/{project}/{id}/tags",
            post(routes::resources::tag::<L>),
        )
        .route(
            "/resources/{org}/{project}/{id}/tags/{tag}",
            delete(routes::resources::delete_tag::<L>),
        )
        .route(
            "/resolve/{org}/{project}/{id}",
            get(routes::resolvers::resolve::<L>),
        )
        .route("/events", get(routes::events::global::<L>))
        .route("/events/{org}", get(routes::events::organization::<L>))
        .route("/events/{org}/{project}", get(routes::events::project::<L>))
        .route(
            "/events/{org}/{project}/{id}",
            get(routes::events::resource::<L>),
        )
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over `log`.
pub fn create_state<L: EventLog + Clone + 'static>(
    log: L,
    config: DomainConfig,
    metrics: PrometheusHandle,
) -> Arc<AppState<L>> {
    Arc::new(AppState {
        services: Services::new(log.clone(), config),
        streamer: EventStreamer::new(log),
        metrics,
    })
}

/// Replays the log into the state caches of every entity kind.
///
/// Run once at startup, before serving: the resolver priority check and the
/// quotas read the caches.
pub async fn rebuild_caches<L: EventLog + Clone + 'static>(
    services: &Services<L>,
) -> projections::Result<u64> {
    let mut processor = ProjectionProcessor::new(services.log.clone());
    processor.register(Box::new(CacheProjection::<Organizations>::new(
        services.organizations.coordinator().cache().clone(),
    )));
    processor.register(Box::new(CacheProjection::<Projects>::new(
        services.projects.coordinator().cache().clone(),
    )));
    processor.register(Box::new(CacheProjection::<Resolvers>::new(
        services.resolvers.coordinator().cache().clone(),
    )));
    processor.register(Box::new(CacheProjection::<Resources>::new(
        services.resources.coordinator().cache().clone(),
    )));
    processor.register(Box::new(CacheProjection::<Acls>::new(
        services.acls.coordinator().cache().clone(),
    )));
    processor.run_catch_up().await
}

/// Grants every permission at the root to the users of `realm`, unless a
/// root ACL already exists.
pub async fn provision_admin<L: EventLog + Clone + 'static>(
    services: &Services<L>,
    realm: &str,
) -> Result<bool, error::ApiError> {
    let acl = Acl::new().grant(
        Identity::Authenticated {
            realm: realm.to_string(),
        },
        common::permission::all(),
    );
    let created = services
        .acls
        .provision(&Scope::Root, acl, Subject::Anonymous)
        .await?;
    if created {
        tracing::info!(realm, "provisioned root ACL");
    }
    Ok(created)
}
