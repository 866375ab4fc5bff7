//! Background job interception

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::FutureExt;

use super::context::{CaptureContext, ContextTeardown};
use super::panic_message;
use super::request::CaptureSettings;
use crate::data::types::{JobRunPayload, JobRunStatus};
use crate::domain::tracker::Tracker;
use crate::utils::time::elapsed_ms;

/// What the job framework knows about one execution
#[derive(Debug, Clone, PartialEq)]
pub struct JobDescriptor {
    pub job_name: String,
    pub queue: Option<String>,
    /// Framework job id; a UUID v4 is generated when absent
    pub run_id: Option<String>,
    pub attempts: u32,
    pub enqueued_at: Option<DateTime<Utc>>,
    pub adapter: Option<String>,
    /// Status recorded when the job returns an error (`failed` unless the
    /// framework will retry or discard it)
    pub failure_status: JobRunStatus,
}

impl JobDescriptor {
    pub fn new(job_name: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            queue: None,
            run_id: None,
            attempts: 1,
            enqueued_at: None,
            adapter: None,
            failure_status: JobRunStatus::Failed,
        }
    }

    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_enqueued_at(mut self, enqueued_at: DateTime<Utc>) -> Self {
        self.enqueued_at = Some(enqueued_at);
        self
    }

    pub fn with_adapter(mut self, adapter: impl Into<String>) -> Self {
        self.adapter = Some(adapter.into());
        self
    }

    pub fn with_failure_status(mut self, status: JobRunStatus) -> Self {
        self.failure_status = status;
        self
    }
}

/// Wraps job executions and hands finished runs to the tracker
#[derive(Clone)]
pub struct JobInterceptor {
    settings: CaptureSettings,
    tracker: Tracker,
}

impl JobInterceptor {
    pub fn new(settings: CaptureSettings, tracker: Tracker) -> Self {
        Self { settings, tracker }
    }

    /// Run one job execution; its result (or panic) is passed through unchanged
    pub async fn run<F, T, E>(&self, descriptor: JobDescriptor, job: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        if !self.settings.should_capture_job(&descriptor.job_name) {
            return job.await;
        }

        let context = CaptureContext::new();
        let teardown = ContextTeardown::new(Arc::clone(&context));
        let occurred_at = Utc::now();
        let start = Instant::now();

        let outcome = AssertUnwindSafe(context.scope(job)).catch_unwind().await;

        let duration_ms = elapsed_ms(start);
        let operations = teardown.finish();

        let (status, error_class, error_message) = match &outcome {
            Ok(Ok(_)) => (JobRunStatus::Success, None, None),
            Ok(Err(e)) => (
                descriptor.failure_status,
                Some(std::any::type_name::<E>().to_string()),
                Some(e.to_string()),
            ),
            Err(panic) => (
                JobRunStatus::Failed,
                Some("panic".to_string()),
                Some(panic_message(&**panic)),
            ),
        };

        let run_id = descriptor
            .run_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut payload = JobRunPayload::new(descriptor.job_name, run_id, status, duration_ms);
        payload.queue = descriptor.queue;
        payload.attempts = descriptor.attempts;
        payload.enqueued_at = descriptor.enqueued_at;
        payload.adapter = descriptor.adapter;
        payload.error_class = error_class;
        payload.error_message = error_message;
        payload.occurred_at = occurred_at;
        payload.operations = operations;
        self.tracker.submit(payload.into()).await;

        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::record_operation;
    use crate::core::config::CaptureConfig;
    use crate::data::types::{OperationEvent, OperationKind, TrackingPayload};
    use crate::domain::tracker::TrackerOptions;
    use crate::domain::tracker::testing::{FakeRepository, RecordingSink};

    fn interceptor(repo: &Arc<FakeRepository>, ignored: &[&str]) -> JobInterceptor {
        let config = CaptureConfig {
            ignored_routes: ignored.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        let tracker = Tracker::new(
            Arc::clone(repo) as _,
            Arc::new(RecordingSink::default()),
            TrackerOptions::sync_for_test(),
        );
        JobInterceptor::new(CaptureSettings::from_config(&config), tracker)
    }

    fn runs(repo: &FakeRepository) -> Vec<JobRunPayload> {
        repo.persisted()
            .into_iter()
            .filter_map(|p| match p {
                TrackingPayload::JobRun(j) => Some(j),
                TrackingPayload::Request(_) => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_successful_run_captured() {
        let repo = Arc::new(FakeRepository::default());
        let interceptor = interceptor(&repo, &[]);

        let descriptor = JobDescriptor::new("ReportJob")
            .with_queue("default")
            .with_run_id("run-1")
            .with_adapter("apalis");
        let value: Result<u32, String> = interceptor
            .run(descriptor, async {
                record_operation(OperationEvent::new(OperationKind::Sql, "SELECT 1", 2.0));
                Ok(7)
            })
            .await;
        assert_eq!(value, Ok(7));

        let captured = runs(&repo);
        assert_eq!(captured.len(), 1);
        let run = &captured[0];
        assert_eq!(run.run_id, "run-1");
        assert_eq!(run.status, JobRunStatus::Success);
        assert_eq!(run.queue.as_deref(), Some("default"));
        assert_eq!(run.adapter.as_deref(), Some("apalis"));
        assert_eq!(run.operations.len(), 1);
        assert!(run.error_class.is_none());
    }

    #[tokio::test]
    async fn test_error_recorded_with_failure_status() {
        let repo = Arc::new(FakeRepository::default());
        let interceptor = interceptor(&repo, &[]);

        let descriptor = JobDescriptor::new("SyncJob")
            .with_attempts(2)
            .with_failure_status(JobRunStatus::Retried);
        let result: Result<(), std::io::Error> = interceptor
            .run(descriptor, async {
                Err(std::io::Error::other("upstream timed out"))
            })
            .await;
        assert!(result.is_err());

        let run = &runs(&repo)[0];
        assert_eq!(run.status, JobRunStatus::Retried);
        assert_eq!(run.attempts, 2);
        assert!(run.error_class.as_deref().unwrap().ends_with("Error"));
        assert_eq!(run.error_message.as_deref(), Some("upstream timed out"));
    }

    fn exploding_job() -> Result<(), String> {
        panic!("worker exploded")
    }

    #[tokio::test]
    async fn test_panic_recorded_then_resumed() {
        let repo = Arc::new(FakeRepository::default());
        let interceptor = interceptor(&repo, &[]);

        let outcome = AssertUnwindSafe(
            interceptor.run(JobDescriptor::new("CrashJob"), async { exploding_job() }),
        )
        .catch_unwind()
        .await;
        assert!(outcome.is_err());

        let run = &runs(&repo)[0];
        assert_eq!(run.status, JobRunStatus::Failed);
        assert_eq!(run.error_class.as_deref(), Some("panic"));
        assert_eq!(run.error_message.as_deref(), Some("worker exploded"));
    }

    #[tokio::test]
    async fn test_ignored_job_not_captured() {
        let repo = Arc::new(FakeRepository::default());
        let interceptor = interceptor(&repo, &["HeartbeatJob"]);

        let result: Result<(), String> = interceptor
            .run(JobDescriptor::new("HeartbeatJob"), async { Ok(()) })
            .await;
        assert!(result.is_ok());
        assert!(runs(&repo).is_empty());
    }
}
