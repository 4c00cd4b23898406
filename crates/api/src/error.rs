//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::acls::AclRejection;
use domain::organizations::OrganizationRejection;
use domain::projects::ProjectRejection;
use domain::resolvers::{ResolutionError, ResolutionReport, ResolverRejection};
use domain::resources::ResourceRejection;
use domain::{CommandError, FetchError};
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request from the client.
    #[error("Bad request: {0}")]
    BadRequest(String),
    /// A refused command or a missing entity, reported with its reason.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
    /// A reference no resolver could serve.
    #[error("{message}")]
    NotResolved {
        message: String,
        report: ResolutionReport,
    },
    /// Infrastructure failure; the details are logged, never returned.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": msg }),
            ),
            ApiError::Rejected { status, message } => {
                (status, serde_json::json!({ "error": message }))
            }
            ApiError::NotResolved { message, report } => (
                StatusCode::NOT_FOUND,
                serde_json::json!({ "error": message, "report": report }),
            ),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "error": "internal server error" }),
                )
            }
        };

        (status, axum::Json(body)).into_response()
    }
}

/// HTTP status of an entity rejection.
pub trait RejectionStatus: std::fmt::Display {
    fn status(&self) -> StatusCode;
}

impl RejectionStatus for OrganizationRejection {
    fn status(&self) -> StatusCode {
        match self {
            OrganizationRejection::NotFound(_) => StatusCode::NOT_FOUND,
            OrganizationRejection::AlreadyExists(_) | OrganizationRejection::IsDeprecated(_) => {
                StatusCode::CONFLICT
            }
        }
    }
}

impl RejectionStatus for ProjectRejection {
    fn status(&self) -> StatusCode {
        match self {
            ProjectRejection::NotFound(_) | ProjectRejection::OrganizationNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ProjectRejection::AlreadyExists(_)
            | ProjectRejection::IsDeprecated(_)
            | ProjectRejection::OrganizationIsDeprecated(_) => StatusCode::CONFLICT,
        }
    }
}

impl RejectionStatus for ResolverRejection {
    fn status(&self) -> StatusCode {
        match self {
            ResolverRejection::NotFound(_) | ResolverRejection::ProjectNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ResolverRejection::NoIdentities | ResolverRejection::DifferentResolverType { .. } => {
                StatusCode::BAD_REQUEST
            }
            ResolverRejection::AlreadyExists { .. }
            | ResolverRejection::IsDeprecated(_)
            | ResolverRejection::PriorityAlreadyExists { .. }
            | ResolverRejection::ProjectIsDeprecated(_) => StatusCode::CONFLICT,
        }
    }
}

impl RejectionStatus for ResourceRejection {
    fn status(&self) -> StatusCode {
        match self {
            ResourceRejection::NotFound(_)
            | ResourceRejection::ProjectNotFound(_)
            | ResourceRejection::TagNotFound(_) => StatusCode::NOT_FOUND,
            ResourceRejection::InvalidSource(_) | ResourceRejection::RevisionNotFound { .. } => {
                StatusCode::BAD_REQUEST
            }
            ResourceRejection::AlreadyExists { .. }
            | ResourceRejection::IsDeprecated(_)
            | ResourceRejection::ProjectIsDeprecated(_) => StatusCode::CONFLICT,
        }
    }
}

impl RejectionStatus for AclRejection {
    fn status(&self) -> StatusCode {
        match self {
            AclRejection::AclNotFound(_) => StatusCode::NOT_FOUND,
            AclRejection::NothingToBeUpdated(_) | AclRejection::IsEmpty(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }
}

impl<R: RejectionStatus> From<CommandError<R>> for ApiError {
    fn from(err: CommandError<R>) -> Self {
        let status = match &err {
            CommandError::Rejected(rejection) => rejection.status(),
            CommandError::IncorrectRevision { .. } => StatusCode::CONFLICT,
            CommandError::Unauthorized { .. } => StatusCode::FORBIDDEN,
            CommandError::QuotaReached { .. } => StatusCode::BAD_REQUEST,
            CommandError::WriteContention { .. }
            | CommandError::InvariantViolation(_)
            | CommandError::Storage(_) => return ApiError::Internal(err.to_string()),
        };
        ApiError::Rejected {
            status,
            message: err.to_string(),
        }
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::NotFound { .. }
            | FetchError::RevisionNotFound { .. }
            | FetchError::TagNotFound { .. } => ApiError::Rejected {
                status: StatusCode::NOT_FOUND,
                message: err.to_string(),
            },
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ResolutionError> for ApiError {
    fn from(err: ResolutionError) -> Self {
        match err {
            ResolutionError::NotResolved { ref report, .. } => ApiError::NotResolved {
                report: report.clone(),
                message: err.to_string(),
            },
            ResolutionError::Fetch(e) => e.into(),
            ResolutionError::Storage(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<event_store::EventLogError> for ApiError {
    fn from(err: event_store::EventLogError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
