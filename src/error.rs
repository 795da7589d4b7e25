use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use std::time::Duration;
use thiserror::Error as ThisError;
use tracing::error;

use crate::indieauth::RejectReason;

#[derive(Debug, ThisError)]
pub enum MicrolightError {
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("refusing to {0} without a predicate")]
    UnsafeBulkOperation(&'static str),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("data corruption: {0}")]
    DataCorruption(String),

    #[error("Database error: {0}")]
    DatabaseError(#[source] SqlxError),

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),

    #[error("transport error: {0}")]
    TransportError(String),

    #[error("request timed out after {0:?}")]
    RequestTimeout(Duration),

    #[error("request rejected: {0}")]
    Rejected(RejectReason),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl From<SqlxError> for MicrolightError {
    fn from(e: SqlxError) -> Self {
        match e {
            SqlxError::Configuration(_)
            | SqlxError::Io(_)
            | SqlxError::Tls(_)
            | SqlxError::PoolTimedOut
            | SqlxError::PoolClosed
            | SqlxError::WorkerCrashed => MicrolightError::StorageUnavailable(e.to_string()),
            SqlxError::ColumnDecode { .. }
            | SqlxError::ColumnNotFound(_)
            | SqlxError::ColumnIndexOutOfBounds { .. }
            | SqlxError::Decode(_)
            | SqlxError::TypeNotFound { .. } => MicrolightError::DataCorruption(e.to_string()),
            SqlxError::RowNotFound => MicrolightError::NotFound("row".to_string()),
            other => MicrolightError::DatabaseError(other),
        }
    }
}

/// Outward HTTP statuses used by the Micropub endpoint, each carrying the
/// description sent in the `error` field of an error payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpStatus {
    Ok,
    Created,
    NoContent,
    InvalidRequest,
    Unauthorized,
    InsufficientScope,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    ServerError,
    BadGateway,
}

impl HttpStatus {
    pub fn code(self) -> StatusCode {
        match self {
            HttpStatus::Ok => StatusCode::OK,
            HttpStatus::Created => StatusCode::CREATED,
            HttpStatus::NoContent => StatusCode::NO_CONTENT,
            HttpStatus::InvalidRequest => StatusCode::BAD_REQUEST,
            HttpStatus::Unauthorized | HttpStatus::InsufficientScope => StatusCode::UNAUTHORIZED,
            HttpStatus::Forbidden => StatusCode::FORBIDDEN,
            HttpStatus::NotFound => StatusCode::NOT_FOUND,
            HttpStatus::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            HttpStatus::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
            HttpStatus::BadGateway => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            HttpStatus::Ok => "OK",
            HttpStatus::Created => "Created",
            HttpStatus::NoContent => "No Content",
            HttpStatus::InvalidRequest => "invalid_request",
            HttpStatus::Unauthorized => "unauthorized",
            HttpStatus::InsufficientScope => "insufficient_scope",
            HttpStatus::Forbidden => "forbidden",
            HttpStatus::NotFound => "not_found",
            HttpStatus::MethodNotAllowed => "Method Not Allowed",
            HttpStatus::ServerError => "server_error",
            HttpStatus::BadGateway => "bad_gateway",
        }
    }
}

impl MicrolightError {
    /// Outward status for this failure.
    pub fn status(&self) -> HttpStatus {
        match self {
            MicrolightError::Rejected(RejectReason::MissingToken) => HttpStatus::Unauthorized,
            MicrolightError::Rejected(_) => HttpStatus::Forbidden,
            MicrolightError::NotFound(_) => HttpStatus::NotFound,
            MicrolightError::InvalidRequest(_) | MicrolightError::Json(_) => {
                HttpStatus::InvalidRequest
            }
            MicrolightError::TransportError(_)
            | MicrolightError::RequestTimeout(_)
            | MicrolightError::InvalidResponse(_)
            | MicrolightError::UrlParse(_) => HttpStatus::BadGateway,
            MicrolightError::InvalidIdentifier(_)
            | MicrolightError::UnsafeBulkOperation(_)
            | MicrolightError::StorageUnavailable(_)
            | MicrolightError::DataCorruption(_)
            | MicrolightError::DatabaseError(_) => HttpStatus::ServerError,
        }
    }
}

impl IntoResponse for MicrolightError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let error_description = match status {
            HttpStatus::ServerError => {
                error!(error = %self, "request failed with an internal error");
                "An internal server error occurred.".to_string()
            }
            HttpStatus::BadGateway => "Upstream service is unavailable.".to_string(),
            _ => self.to_string(),
        };
        let body = MicropubErrorBody {
            error: status.description().to_string(),
            error_description,
        };
        (status.code(), Json(body)).into_response()
    }
}

/// Standardized Micropub error payload.
#[derive(Debug, Serialize)]
pub struct MicropubErrorBody {
    pub error: String,
    pub error_description: String,
}
