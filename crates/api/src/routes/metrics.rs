//! Prometheus metrics endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use event_store::{EventLog, Tag};

use super::AppState;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// GET /metrics: Prometheus text format.
///
/// The head offset of the log is sampled on each scrape.
pub async fn get<L: EventLog + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
) -> impl IntoResponse {
    match state.services.log.last_offset(&Tag::all()).await {
        Ok(head) => metrics::gauge!("event_log_head_offset").set(head.as_i64() as f64),
        Err(e) => tracing::warn!(error = %e, "could not sample the log head"),
    }
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        state.metrics.render(),
    )
}
