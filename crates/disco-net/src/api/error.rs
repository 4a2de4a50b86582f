//! Mapping of domain errors onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use disco_pair::PairError;
use disco_store::StoreError;

/// Body of every non-success response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status_code: u16,
    pub status: String,
    pub error: String,
}

/// Body of a success response that carries no data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusBody {
    pub status_code: u16,
    pub status: String,
}

impl StatusBody {
    pub fn ok() -> Self {
        Self::from(StatusCode::OK)
    }
}

impl From<StatusCode> for StatusBody {
    fn from(code: StatusCode) -> Self {
        Self {
            status_code: code.as_u16(),
            status: code.canonical_reason().unwrap_or_default().to_string(),
        }
    }
}

/// An error as seen by the network caller.
///
/// Authentication and authorization failures carry no detail; the reason
/// is logged where it is decided.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("{0}")]
    NotFound(String),
    #[error("internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(msg) => ApiError::NotFound(msg),
            e @ (StoreError::InvalidNamespace(_) | StoreError::EmptyKey) => {
                ApiError::BadRequest(e.to_string())
            }
            e => {
                tracing::error!(error = %e, "store operation failed");
                ApiError::Internal
            }
        }
    }
}

impl From<PairError> for ApiError {
    fn from(e: PairError) -> Self {
        match e {
            PairError::Unauthorized => ApiError::Unauthorized,
            PairError::BadRequest(msg) => ApiError::BadRequest(msg),
            e => {
                tracing::error!(error = %e, "join failed");
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            status_code: status.as_u16(),
            status: status.canonical_reason().unwrap_or_default().to_string(),
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
