//! Health check endpoint

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::tracker::Tracker;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `ok` or `unavailable`
    pub status: &'static str,
    /// `connected` or `disconnected`
    pub database: &'static str,
    /// RFC 3339 time of the check
    pub timestamp: String,
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Storage is reachable", body = HealthResponse),
        (status = 503, description = "Storage is unreachable", body = HealthResponse)
    )
)]
pub async fn health(State(tracker): State<Tracker>) -> impl IntoResponse {
    let healthy = tracker.healthy().await;
    let (code, status, database) = if healthy {
        (StatusCode::OK, "ok", "connected")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable", "disconnected")
    };

    (
        code,
        Json(HealthResponse {
            status,
            database,
            timestamp: Utc::now().to_rfc3339(),
        }),
    )
}
