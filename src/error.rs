//! Application error types

use crate::forecasting::ModelError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Store connectivity error: {0}")]
    Connectivity(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No data: {0}")]
    NoData(String),

    #[error("Malformed row: {0}")]
    MalformedRow(String),

    #[error("Model fit error: {0}")]
    ModelFit(#[from] ModelError),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Cache write error: {0}")]
    CacheWrite(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

// SQL failures surface to callers as a single connectivity error kind; callers decide
// fallback policy.
impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        tracing::error!("SQL failure: {}", err);
        AppError::Connectivity(err.to_string())
    }
}

/// Serializable error body returned by the HTTP surface
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: &str) -> Self {
        Self {
            error: error.to_string(),
            details: None,
        }
    }

    pub fn with_details(error: &str, details: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            details: Some(details.into()),
        }
    }
}

impl AppError {
    /// HTTP status an online caller sees for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Connectivity(_) | AppError::NoData(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing error body
    pub fn to_response(&self) -> ErrorResponse {
        match self {
            AppError::Validation(msg) => ErrorResponse::new(msg),
            AppError::Connectivity(msg) => {
                ErrorResponse::with_details("failed to fetch sensor data", msg.clone())
            }
            AppError::NoData(_) => ErrorResponse::new("no sensor data available"),
            AppError::MalformedRow(msg) => {
                ErrorResponse::with_details("unexpected sensor row format", msg.clone())
            }
            other => ErrorResponse::with_details("internal server error", other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.to_response())).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::Validation("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Connectivity("down".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::NoData("empty".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::MalformedRow("null".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::CacheWrite("rolled back".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_validation_body_has_no_details() {
        let body = AppError::Validation("'days' must be an integer".into()).to_response();
        assert_eq!(body.error, "'days' must be an integer");
        assert!(body.details.is_none());

        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("details").is_none());
    }
}
