//! HTTP handlers and the extractors they share.

pub mod events;
pub mod health;
pub mod metrics;
pub mod organizations;
pub mod projects;
pub mod resolvers;
pub mod resources;

use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use common::{Caller, Iri, Permission, Scope, Subject};
use domain::Services;
use domain::resources::ResourceRef;
use event_store::Revision;
use metrics_exporter_prometheus::PrometheusHandle;
use projections::EventStreamer;
use serde::Deserialize;

use crate::error::ApiError;

/// Header carrying the authenticated subject as `subject@realm`.
///
/// Authentication happens in front of this service; requests without the
/// header act as the anonymous subject.
pub const SUBJECT_HEADER: &str = "x-subject";

/// Shared application state accessible from all handlers.
pub struct AppState<L> {
    pub services: Services<L>,
    pub streamer: EventStreamer<L>,
    pub metrics: PrometheusHandle,
}

/// The caller of the current request.
#[derive(Debug, Clone)]
pub struct CurrentCaller(pub Caller);

impl<S: Send + Sync> FromRequestParts<S> for CurrentCaller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(SUBJECT_HEADER) else {
            return Ok(CurrentCaller(Caller::anonymous()));
        };
        let raw = value
            .to_str()
            .map_err(|_| ApiError::BadRequest(format!("{SUBJECT_HEADER} is not valid text")))?;
        match raw.rsplit_once('@') {
            Some((subject, realm)) if !subject.is_empty() && !realm.is_empty() => {
                Ok(CurrentCaller(Caller::from(Subject::user(subject, realm))))
            }
            _ => Err(ApiError::BadRequest(format!(
                "{SUBJECT_HEADER} must read 'subject@realm', got '{raw}'"
            ))),
        }
    }
}

/// The revision a write is based on.
#[derive(Debug, Deserialize)]
pub struct RevQuery {
    pub rev: i64,
}

impl RevQuery {
    pub fn revision(&self) -> Revision {
        Revision::new(self.rev)
    }
}

/// Selects a past state on reads: `?rev=N` or `?tag=T`, latest when absent.
#[derive(Debug, Default, Deserialize)]
pub struct AtQuery {
    pub rev: Option<i64>,
    pub tag: Option<String>,
}

impl AtQuery {
    /// The reference these parameters select on `id`.
    pub fn reference(self, id: Iri) -> Result<ResourceRef, ApiError> {
        match (self.rev, self.tag) {
            (None, None) => Ok(ResourceRef::latest(id)),
            (Some(rev), None) => Ok(ResourceRef::revision(id, Revision::new(rev))),
            (None, Some(tag)) => Ok(ResourceRef::tag(id, tag)),
            (Some(_), Some(_)) => Err(ApiError::BadRequest(
                "'rev' and 'tag' cannot be combined".to_string(),
            )),
        }
    }
}

/// Fails with 403 unless the caller holds `permission` on `address`.
///
/// Writes are authorized by the services; reads are authorized here.
pub async fn authorize_read<L>(
    state: &AppState<L>,
    caller: &Caller,
    address: &Scope,
    permission: Permission,
) -> Result<(), ApiError> {
    if state
        .services
        .permissions
        .has_permission(caller, address, &permission)
        .await?
    {
        Ok(())
    } else {
        Err(ApiError::Rejected {
            status: StatusCode::FORBIDDEN,
            message: format!("Permission '{permission}' is required on '{address}'"),
        })
    }
}

/// Pagination and filters of list endpoints.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub from: usize,
    #[serde(default = "default_size")]
    pub size: usize,
    #[serde(default)]
    pub deprecated: bool,
}

fn default_size() -> usize {
    domain::Pagination::DEFAULT_SIZE
}

impl ListQuery {
    pub fn pagination(&self) -> domain::Pagination {
        domain::Pagination::new(self.from, self.size)
    }
}
