//! Inbound request interception
//!
//! [`RequestInterceptor::run`] wraps one request handler future. The axum
//! middleware in `api::middleware` is a thin adapter over it; non-axum hosts
//! can call it directly with a [`RequestDescriptor`].

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;
use axum::response::Response;
use chrono::Utc;
use futures::FutureExt;

use super::context::{CaptureContext, ContextTeardown};
use super::guard::is_suppressed;
use super::ignore::IgnoreRules;
use super::panic_message;
use crate::core::config::CaptureConfig;
use crate::data::types::RequestPayload;
use crate::domain::tracker::Tracker;
use crate::utils::time::elapsed_ms;

/// Controller/action label a handler attaches to its response extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteLabel(pub String);

/// Capture switches shared by the request and job wrappers
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub enabled: bool,
    pub ignore: Arc<IgnoreRules>,
}

impl CaptureSettings {
    pub fn from_config(config: &CaptureConfig) -> Self {
        Self {
            enabled: config.enabled,
            ignore: Arc::new(IgnoreRules::new(&config.mount_path, &config.ignored_routes)),
        }
    }

    /// Decided once per unit of work, before any instrumentation starts
    pub fn should_capture(&self, method: &str, path: &str) -> bool {
        self.enabled && !is_suppressed() && !self.ignore.is_ignored(method, path)
    }

    pub fn should_capture_job(&self, job_name: &str) -> bool {
        self.enabled && !is_suppressed() && !self.ignore.is_ignored_job(job_name)
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self::from_config(&CaptureConfig::default())
    }
}

/// What the host knows about a request before running it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub method: String,
    /// Route pattern when known, else the raw path
    pub path: String,
    /// Host-provided request id; a UUID v4 is generated when absent
    pub unique_id: Option<String>,
    pub label: Option<String>,
}

impl RequestDescriptor {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            unique_id: None,
            label: None,
        }
    }

    pub fn with_unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = Some(unique_id.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Handler outputs the interceptor can read a status from
pub trait CapturedResponse {
    fn status(&self) -> u16;

    /// Label reported by the handler itself, preferred over the descriptor's
    fn label(&self) -> Option<String> {
        None
    }
}

impl CapturedResponse for u16 {
    fn status(&self) -> u16 {
        *self
    }
}

impl CapturedResponse for StatusCode {
    fn status(&self) -> u16 {
        self.as_u16()
    }
}

impl CapturedResponse for Response {
    fn status(&self) -> u16 {
        Response::status(self).as_u16()
    }

    fn label(&self) -> Option<String> {
        self.extensions().get::<RouteLabel>().map(|l| l.0.clone())
    }
}

impl<T: CapturedResponse, E> CapturedResponse for Result<T, E> {
    fn status(&self) -> u16 {
        match self {
            Ok(response) => response.status(),
            Err(_) => StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
        }
    }

    fn label(&self) -> Option<String> {
        self.as_ref().ok().and_then(|response| response.label())
    }
}

/// Wraps request handlers and hands finished requests to the tracker
#[derive(Clone)]
pub struct RequestInterceptor {
    settings: CaptureSettings,
    tracker: Tracker,
}

impl RequestInterceptor {
    pub fn new(settings: CaptureSettings, tracker: Tracker) -> Self {
        Self { settings, tracker }
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Run a handler, capturing it unless disabled, guarded or ignored
    ///
    /// The handler's output (or panic) is passed through unchanged.
    pub async fn run<F, R>(&self, descriptor: RequestDescriptor, handler: F) -> R
    where
        F: Future<Output = R>,
        R: CapturedResponse,
    {
        if !self
            .settings
            .should_capture(&descriptor.method, &descriptor.path)
        {
            return handler.await;
        }

        let context = CaptureContext::new();
        let teardown = ContextTeardown::new(Arc::clone(&context));
        let occurred_at = Utc::now();
        let start = Instant::now();

        let outcome = AssertUnwindSafe(context.scope(handler))
            .catch_unwind()
            .await;

        let duration_ms = elapsed_ms(start);
        let operations = teardown.finish();

        let (status, response_label) = match &outcome {
            Ok(response) => (response.status(), response.label()),
            Err(panic) => {
                tracing::debug!(
                    method = %descriptor.method,
                    path = %descriptor.path,
                    panic = %panic_message(&**panic),
                    "Captured request panicked"
                );
                (StatusCode::INTERNAL_SERVER_ERROR.as_u16(), None)
            }
        };

        let RequestDescriptor {
            method,
            path,
            unique_id,
            label,
        } = descriptor;
        let label = response_label
            .or(label)
            .unwrap_or_else(|| format!("{} {}", method, path));
        let unique_id = unique_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let payload = RequestPayload::new(method, path, status, duration_ms, unique_id)
            .with_label(label)
            .with_occurred_at(occurred_at)
            .with_operations(operations);
        self.tracker.submit(payload.into()).await;

        match outcome {
            Ok(response) => response,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::capture::{record_operation, suppressed};
    use crate::data::types::{OperationEvent, OperationKind, TrackingPayload};
    use crate::domain::tracker::testing::{FakeRepository, RecordingSink};
    use crate::domain::tracker::TrackerOptions;

    fn interceptor(repo: &Arc<FakeRepository>, ignored: &[&str]) -> RequestInterceptor {
        let config = CaptureConfig {
            ignored_routes: ignored.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        let tracker = Tracker::new(
            Arc::clone(repo) as _,
            Arc::new(RecordingSink::default()),
            TrackerOptions::sync_for_test(),
        );
        RequestInterceptor::new(CaptureSettings::from_config(&config), tracker)
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

    #[tokio::test]
    async fn test_captures_status_operations_and_label() {
        let repo = Arc::new(FakeRepository::default());
        let interceptor = interceptor(&repo, &[]);

        let status = interceptor
            .run(
                RequestDescriptor::new("GET", "/users").with_unique_id("uuid-1"),
                async {
                    record_operation(OperationEvent::new(
                        OperationKind::Sql,
                        "SELECT * FROM users",
                        50.0,
                    ));
                    StatusCode::OK
                },
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let captured = requests(&repo);
        assert_eq!(captured.len(), 1);
        let request = &captured[0];
        assert_eq!(request.unique_id, "uuid-1");
        assert_eq!(request.status, 200);
        assert!(!request.is_error);
        assert_eq!(request.label.as_deref(), Some("GET /users"));
        assert_eq!(request.operations.len(), 1);
        assert!(request.duration_ms >= 0.0);
    }

    #[tokio::test]
    async fn test_generates_unique_id_when_absent() {
        let repo = Arc::new(FakeRepository::default());
        let interceptor = interceptor(&repo, &[]);

        interceptor
            .run(RequestDescriptor::new("GET", "/a"), async { 200u16 })
            .await;
        interceptor
            .run(
                RequestDescriptor::new("GET", "/a").with_unique_id("  "),
                async { 200u16 },
            )
            .await;

        let captured = requests(&repo);
        assert_eq!(captured.len(), 2);
        assert_ne!(captured[0].unique_id, captured[1].unique_id);
        assert!(uuid::Uuid::parse_str(&captured[0].unique_id).is_ok());
    }

    #[tokio::test]
    async fn test_ignored_and_mount_paths_produce_nothing() {
        let repo = Arc::new(FakeRepository::default());
        let interceptor = interceptor(&repo, &["/up"]);

        interceptor
            .run(RequestDescriptor::new("GET", "/up"), async { 200u16 })
            .await;
        interceptor
            .run(RequestDescriptor::new("GET", "/pulse/health"), async { 200u16 })
            .await;
        interceptor
            .run(RequestDescriptor::new("GET", "/pulse"), async { 200u16 })
            .await;

        assert!(requests(&repo).is_empty());
    }

    #[tokio::test]
    async fn test_ignored_route_records_nothing_into_context() {
        let repo = Arc::new(FakeRepository::default());
        let interceptor = interceptor(&repo, &["/up"]);

        let recorded = AtomicBool::new(true);
        let status = interceptor
            .run(RequestDescriptor::new("GET", "/up"), async {
                recorded.store(
                    record_operation(OperationEvent::new(OperationKind::Sql, "SELECT 1", 1.0)),
                    Ordering::SeqCst,
                );
                200u16
            })
            .await;
        assert_eq!(status, 200);
        assert!(!recorded.load(Ordering::SeqCst));
        assert!(requests(&repo).is_empty());
    }

    #[tokio::test]
    async fn test_disabled_passes_through() {
        let repo = Arc::new(FakeRepository::default());
        let mut interceptor = interceptor(&repo, &[]);
        interceptor.settings.enabled = false;

        let status = interceptor
            .run(RequestDescriptor::new("GET", "/users"), async { 201u16 })
            .await;
        assert_eq!(status, 201);
        assert!(requests(&repo).is_empty());
    }

    #[tokio::test]
    async fn test_guarded_request_not_captured() {
        let repo = Arc::new(FakeRepository::default());
        let interceptor = interceptor(&repo, &[]);

        suppressed(interceptor.run(RequestDescriptor::new("GET", "/users"), async { 200u16 }))
            .await;
        assert!(requests(&repo).is_empty());
    }

    #[tokio::test]
    async fn test_error_result_captured_as_500() {
        let repo = Arc::new(FakeRepository::default());
        let interceptor = interceptor(&repo, &[]);

        let result: Result<StatusCode, &str> = interceptor
            .run(RequestDescriptor::new("POST", "/orders"), async { Err("boom") })
            .await;
        assert!(result.is_err());

        let captured = requests(&repo);
        assert_eq!(captured[0].status, 500);
        assert!(captured[0].is_error);
    }

    fn exploding_handler() -> u16 {
        panic!("handler exploded")
    }

    #[tokio::test]
    async fn test_panic_captured_then_resumed() {
        let repo = Arc::new(FakeRepository::default());
        let interceptor = interceptor(&repo, &[]);

        let outcome = AssertUnwindSafe(interceptor.run(
            RequestDescriptor::new("GET", "/crash"),
            async {
                record_operation(OperationEvent::new(OperationKind::Sql, "SELECT 1", 1.0));
                exploding_handler()
            },
        ))
        .catch_unwind()
        .await;
        assert!(outcome.is_err());

        let captured = requests(&repo);
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].status, 500);
        assert_eq!(captured[0].operations.len(), 1);
        assert!(CaptureContext::current().is_none());
    }

    #[tokio::test]
    async fn test_response_label_extension_wins() {
        let repo = Arc::new(FakeRepository::default());
        let interceptor = interceptor(&repo, &[]);

        interceptor
            .run(
                RequestDescriptor::new("GET", "/users/{id}").with_label("fallback"),
                async {
                    let mut response = Response::new(axum::body::Body::empty());
                    response
                        .extensions_mut()
                        .insert(RouteLabel("UsersController#show".into()));
                    response
                },
            )
            .await;

        let captured = requests(&repo);
        assert_eq!(captured[0].label.as_deref(), Some("UsersController#show"));
    }
}
