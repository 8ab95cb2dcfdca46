//! REST API endpoint handlers
//!
//! Provides handlers for:
//! - Health check (/health, /)
//! - On-demand forecast (/api/forecast, /api/http_trigger)
//! - Data pull (/api/data, /api/data_pull_http_trigger)

use crate::api::types::*;
use crate::error::{AppError, ErrorResponse};
use crate::services::{DataService, ForecastService};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Json, Query, State as AxumState},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{error, info, warn};

// ============================================================================
// Health Check
// ============================================================================

/// Health check endpoint - GET /health or GET /
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse::ok())
}

// ============================================================================
// Forecast
// ============================================================================

/// Forecast endpoint - GET|POST /api/forecast
///
/// `days` is read from the query string, falling back to a JSON body.
pub async fn forecast(
    AxumState(state): AxumState<Arc<AppState>>,
    query: Result<Query<ForecastQuery>, QueryRejection>,
    body: Bytes,
) -> Response {
    let days = match query
        .map_err(|rejection| {
            AppError::Validation(format!("invalid query string: {}", rejection.body_text()))
        })
        .and_then(|Query(query)| resolve_days(&query, &body))
    {
        Ok(days) => days,
        Err(e) => {
            warn!("Rejected forecast request: {}", e);
            return e.into_response();
        }
    };

    info!("Forecast request for {} day(s)", days);

    // Store access and model fitting are blocking work.
    let result = tokio::task::spawn_blocking(move || ForecastService::forecast(&state, days)).await;

    match result {
        Ok(Ok(response)) => Json(response).into_response(),
        Ok(Err(e)) => {
            error!("Forecast request failed: {}", e);
            e.into_response()
        }
        Err(e) => AppError::Internal(format!("forecast task failed: {}", e)).into_response(),
    }
}

// ============================================================================
// Data Pull
// ============================================================================

/// Data pull endpoint - GET /api/data
pub async fn data_pull(AxumState(state): AxumState<Arc<AppState>>) -> Response {
    let result = tokio::task::spawn_blocking(move || DataService::pull(&state)).await;

    let failure = match result {
        Ok(Ok(data)) => return Json(data).into_response(),
        Ok(Err(e)) => e.to_string(),
        Err(e) => format!("data pull task failed: {}", e),
    };

    error!("Data pull failed: {}", failure);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::with_details("failed to connect to database", failure)),
    )
        .into_response()
}
