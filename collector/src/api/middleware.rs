//! HTTP middleware (request capture, 404 handler)

use axum::extract::{MatchedPath, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::capture::{RequestDescriptor, RequestInterceptor};
use crate::core::constants::REQUEST_ID_HEADER;

/// Capture every request that passes through the router
///
/// Install with `axum::middleware::from_fn_with_state(interceptor, capture_requests)`
/// via `Router::layer` so the matched route pattern is available; requests
/// that match no route are recorded under their raw path.
pub async fn capture_requests(
    State(interceptor): State<RequestInterceptor>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().as_str().to_string();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let mut descriptor = RequestDescriptor::new(method, path);
    if let Some(id) = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        descriptor = descriptor.with_unique_id(id);
    }

    interceptor.run(descriptor, next.run(req)).await
}

/// Handle 404 Not Found with logging
pub async fn handle_404(req: Request) -> impl IntoResponse {
    tracing::debug!("[404] {} {}", req.method(), req.uri());
    StatusCode::NOT_FOUND
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::Router;
    use axum::body::Body;
    use axum::extract::Extension;
    use axum::routing::get;
    use tower::ServiceExt;

    use super::*;
    use crate::capture::{CaptureSettings, RouteLabel, record_operation};
    use crate::core::config::CaptureConfig;
    use crate::data::types::{OperationEvent, OperationKind, RequestPayload, TrackingPayload};
    use crate::domain::tracker::testing::{FakeRepository, RecordingSink};
    use crate::domain::tracker::{Tracker, TrackerOptions};

    fn app(repo: &Arc<FakeRepository>) -> Router {
        let config = CaptureConfig {
            ignored_routes: vec!["/up".into()],
            ..Default::default()
        };
        let tracker = Tracker::new(
            Arc::clone(repo) as _,
            Arc::new(RecordingSink::default()),
            TrackerOptions::sync_for_test(),
        );
        let interceptor = RequestInterceptor::new(CaptureSettings::from_config(&config), tracker);

        Router::new()
            .route(
                "/users/{id}",
                get(|| async {
                    record_operation(OperationEvent::new(
                        OperationKind::Sql,
                        "SELECT * FROM users WHERE id = ?",
                        3.0,
                    ));
                    (Extension(RouteLabel("UsersController#show".into())), "ok")
                }),
            )
            .route("/up", get(|| async { "up" }))
            .route("/pulse/health", get(|| async { "self" }))
            .route(
                "/boom",
                get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
            )
            .fallback(handle_404)
            .layer(axum::middleware::from_fn_with_state(
                interceptor,
                capture_requests,
            ))
    }

    fn requests(repo: &FakeRepository) -> Vec<RequestPayload> {
        repo.persisted()
            .into_iter()
            .filter_map(|p| match p {
                TrackingPayload::Request(r) => Some(r),
                TrackingPayload::JobRun(_) => None,
            })
            .collect()
    }

    async fn send(app: Router, uri: &str, request_id: Option<&str>) -> StatusCode {
        let mut builder = axum::http::Request::builder().uri(uri);
        if let Some(id) = request_id {
            builder = builder.header(REQUEST_ID_HEADER, id);
        }
        let response = app
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        response.status()
    }

    #[tokio::test]
    async fn test_captures_matched_route_pattern() {
        let repo = Arc::new(FakeRepository::default());
        let status = send(app(&repo), "/users/42", Some("req-1")).await;
        assert_eq!(status, StatusCode::OK);

        let captured = requests(&repo);
        assert_eq!(captured.len(), 1);
        let request = &captured[0];
        assert_eq!(request.method, "GET");
        assert_eq!(request.path, "/users/{id}");
        assert_eq!(request.unique_id, "req-1");
        assert_eq!(request.label.as_deref(), Some("UsersController#show"));
        assert_eq!(request.operations.len(), 1);
    }

    #[tokio::test]
    async fn test_ignored_and_self_routes_skipped() {
        let repo = Arc::new(FakeRepository::default());
        assert_eq!(send(app(&repo), "/up", None).await, StatusCode::OK);
        assert_eq!(send(app(&repo), "/pulse/health", None).await, StatusCode::OK);
        assert!(requests(&repo).is_empty());
    }

    #[tokio::test]
    async fn test_error_status_and_unmatched_path() {
        let repo = Arc::new(FakeRepository::default());
        assert_eq!(
            send(app(&repo), "/boom", None).await,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(send(app(&repo), "/nowhere", None).await, StatusCode::NOT_FOUND);

        let captured = requests(&repo);
        assert_eq!(captured.len(), 2);
        assert!(captured[0].is_error);
        assert_eq!(captured[1].path, "/nowhere");
        assert_eq!(captured[1].status, 404);
        assert_eq!(captured[1].label.as_deref(), Some("GET /nowhere"));
    }
}
