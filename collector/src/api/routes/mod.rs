//! API route handlers
//!
//! Everything here is served under the configured mount path, which capture
//! always ignores.

pub mod health;
pub mod stats;

use axum::Router;
use axum::routing::get;

use crate::domain::tracker::Tracker;

use super::openapi::openapi_json;

/// Collector routes, relative to the mount path
pub fn routes(tracker: Tracker) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/stats", get(stats::stats))
        .route("/openapi.json", get(openapi_json))
        .with_state(tracker)
}
