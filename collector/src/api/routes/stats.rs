//! Tracker statistics endpoint

use axum::Json;
use axum::extract::State;

use crate::domain::tracker::{Tracker, TrackerStatsSnapshot};

/// Pipeline counters since startup
#[utoipa::path(
    get,
    path = "/stats",
    tag = "stats",
    responses(
        (status = 200, description = "Tracker counters", body = TrackerStatsSnapshot)
    )
)]
pub async fn stats(State(tracker): State<Tracker>) -> Json<TrackerStatsSnapshot> {
    Json(tracker.stats())
}
