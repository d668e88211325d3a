//! Mapping of domain errors onto HTTP responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use meteo_core::{RuleError, TimelineError};
use meteo_refresh::RefreshError;
use meteo_store::StoreError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Invalid(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RefreshError> for ApiError {
    fn from(e: RefreshError) -> Self {
        match e {
            RefreshError::UnknownPolygon(_) => ApiError::NotFound(e.to_string()),
            RefreshError::Rule(RuleError::UnknownRule(_)) => ApiError::NotFound(e.to_string()),
            RefreshError::Rule(RuleError::DuplicateRule(_)) => ApiError::Conflict(e.to_string()),
            RefreshError::Store(StoreError::DuplicatePolygon(_)) => {
                ApiError::Conflict(e.to_string())
            }
            RefreshError::Store(StoreError::UnknownPolygon(_)) => {
                ApiError::NotFound(e.to_string())
            }
            RefreshError::Geometry(_) | RefreshError::Rule(_) | RefreshError::Store(_) => {
                ApiError::Invalid(e.to_string())
            }
        }
    }
}

impl From<RuleError> for ApiError {
    fn from(e: RuleError) -> Self {
        RefreshError::from(e).into()
    }
}

impl From<TimelineError> for ApiError {
    fn from(e: TimelineError) -> Self {
        ApiError::Invalid(e.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(format!("{e:#}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
