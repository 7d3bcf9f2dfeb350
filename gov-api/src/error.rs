use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use gov_common::{DomainError, Violation};
use gov_connections::ConnectionError;
use gov_metrics::MetricsError;
use gov_planner::{ApplyError, PlanError};

/// Unifies the domain, policy, connection, and store error taxonomies into
/// one type the interface layer dispatches to an HTTP status, mirroring
/// `capture::api::CaptureError`'s typed `IntoResponse` impl.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Invariant(#[from] DomainError),

    #[error("plan has blocking violations; re-run dry-run after resolving them")]
    PolicyViolation(Vec<Violation>),

    #[error("resource '{0}' not found")]
    NotFound(String),

    #[error("endpoint '{0}' is inactive")]
    Inactive(String),

    #[error("plan is stale: live state changed since dry-run; re-run dry-run")]
    Stale,

    #[error("backend call failed: {0}")]
    Backend(String),

    #[error("metadata store call failed: {0}")]
    MetadataStore(String),

    #[error("request is malformed")]
    Validation(Vec<String>),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    violations: Option<Vec<Violation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, violations, details) = match &self {
            ApiError::Invariant(_) => (StatusCode::UNPROCESSABLE_ENTITY, None, None),
            ApiError::PolicyViolation(v) => {
                (StatusCode::UNPROCESSABLE_ENTITY, Some(v.clone()), None)
            }
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, None, None),
            ApiError::Inactive(_) => (StatusCode::UNPROCESSABLE_ENTITY, None, None),
            ApiError::Stale => (StatusCode::UNPROCESSABLE_ENTITY, None, None),
            ApiError::Backend(_) => (StatusCode::INTERNAL_SERVER_ERROR, None, None),
            ApiError::MetadataStore(_) => (StatusCode::INTERNAL_SERVER_ERROR, None, None),
            ApiError::Validation(details) => {
                (StatusCode::UNPROCESSABLE_ENTITY, None, Some(details.clone()))
            }
        };
        let body = ErrorBody {
            error: self.to_string(),
            violations,
            details,
        };
        (status, Json(body)).into_response()
    }
}

impl From<PlanError> for ApiError {
    fn from(e: PlanError) -> Self {
        match e {
            PlanError::Invariant(d) => ApiError::Invariant(d),
            PlanError::NotFound(id) => ApiError::NotFound(id),
            PlanError::Inactive(id) => ApiError::Inactive(id),
            PlanError::Backend(m) => ApiError::Backend(m),
            PlanError::MetadataStore(m) => ApiError::MetadataStore(m),
        }
    }
}

impl From<ApplyError> for ApiError {
    fn from(e: ApplyError) -> Self {
        match e {
            ApplyError::PolicyViolation(v) => ApiError::PolicyViolation(v),
            ApplyError::NotFound(id) => ApiError::NotFound(id),
            ApplyError::Inactive(id) => ApiError::Inactive(id),
            ApplyError::Stale => ApiError::Stale,
            ApplyError::Backend(m) => ApiError::Backend(m),
            ApplyError::MetadataStore(m) => ApiError::MetadataStore(m),
        }
    }
}

impl From<ConnectionError> for ApiError {
    fn from(e: ConnectionError) -> Self {
        match e {
            ConnectionError::NotFound(id) => ApiError::NotFound(id),
            ConnectionError::Inactive(id) => ApiError::Inactive(id),
            ConnectionError::Backend { source, .. } => ApiError::Backend(source.to_string()),
        }
    }
}

impl From<MetricsError> for ApiError {
    fn from(e: MetricsError) -> Self {
        match e {
            MetricsError::NotFound(id) => ApiError::NotFound(id),
            MetricsError::Connection(c) => c.into(),
            MetricsError::Backend(b) => ApiError::Backend(b.to_string()),
            MetricsError::Store(m) => ApiError::MetadataStore(m),
        }
    }
}

/// Turns a batch of field-level problems into a single bulleted message.
pub fn validation_error(problems: Vec<String>) -> ApiError {
    ApiError::Validation(problems)
}
