//! OpenAPI specification

use axum::http::header;
use axum::response::{IntoResponse, Json};
use utoipa::OpenApi;

use crate::api::routes::{health, stats};
use crate::domain::tracker::TrackerStatsSnapshot;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Pulse Collector API",
        version = env!("CARGO_PKG_VERSION"),
        description = "Health and pipeline statistics, relative to the mount path"
    ),
    tags(
        (name = "health", description = "Storage liveness"),
        (name = "stats", description = "Tracker counters")
    ),
    paths(health::health, stats::stats),
    components(schemas(health::HealthResponse, TrackerStatsSnapshot))
)]
pub struct ApiDoc;

/// Serve OpenAPI JSON spec
pub async fn openapi_json() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json")],
        Json(ApiDoc::openapi()),
    )
}
