//! Test doubles for the tracker

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::error::PersistFailure;
use super::sink::DiagnosticSink;
use crate::data::types::{
    JobRunPayload, JobRunRow, MergeReport, OperationOwner, OperationRow, PersistOutcome,
    QueryRow, RequestPayload, RequestRow, RouteRow, TrackingPayload,
};
use crate::data::{DataError, TelemetryRepository};

/// Repository that records payloads and fails on a script
#[derive(Default)]
pub struct FakeRepository {
    /// Errors returned by the next persist calls, in order
    script: Mutex<VecDeque<DataError>>,
    /// When set, every persist call fails with a fresh error from this
    always_fail: Option<fn() -> DataError>,
    panic_on_persist: AtomicBool,
    ping_fails: AtomicBool,
    calls: AtomicU32,
    persisted: Mutex<Vec<TrackingPayload>>,
}

impl FakeRepository {
    pub fn failing_with(errors: Vec<DataError>) -> Self {
        Self {
            script: Mutex::new(errors.into()),
            ..Default::default()
        }
    }

    pub fn always_failing(make_error: fn() -> DataError) -> Self {
        Self {
            always_fail: Some(make_error),
            ..Default::default()
        }
    }

    pub fn panicking() -> Self {
        let repo = Self::default();
        repo.panic_on_persist.store(true, Ordering::SeqCst);
        repo
    }

    pub fn set_ping_fails(&self, fails: bool) {
        self.ping_fails.store(fails, Ordering::SeqCst);
    }

    /// Persist calls made, including failed ones
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn persisted(&self) -> Vec<TrackingPayload> {
        self.persisted.lock().clone()
    }

    fn persist(&self, payload: TrackingPayload) -> Result<PersistOutcome, DataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_persist.load(Ordering::SeqCst) {
            panic!("repository panicked");
        }
        if let Some(make_error) = self.always_fail {
            return Err(make_error());
        }
        if let Some(error) = self.script.lock().pop_front() {
            return Err(error);
        }

        let mut persisted = self.persisted.lock();
        if persisted.iter().any(|p| p.unique_id() == payload.unique_id()) {
            return Ok(PersistOutcome::Duplicate);
        }
        let operations = payload.operations().len();
        persisted.push(payload);
        Ok(PersistOutcome::Created {
            id: persisted.len() as i64,
            operations,
        })
    }
}

#[async_trait]
impl TelemetryRepository for FakeRepository {
    async fn persist_request(&self, payload: &RequestPayload) -> Result<PersistOutcome, DataError> {
        self.persist(payload.clone().into())
    }

    async fn persist_job_run(&self, payload: &JobRunPayload) -> Result<PersistOutcome, DataError> {
        self.persist(payload.clone().into())
    }

    async fn resolve_query(&self, _normalized_sql: &str) -> Result<QueryRow, DataError> {
        Err(DataError::Config("not supported by FakeRepository".into()))
    }

    async fn merge_duplicate_queries(&self) -> Result<MergeReport, DataError> {
        Ok(MergeReport::default())
    }

    async fn find_route(&self, _method: &str, _path: &str) -> Result<Option<RouteRow>, DataError> {
        Ok(None)
    }

    async fn get_request(&self, _request_uuid: &str) -> Result<Option<RequestRow>, DataError> {
        Ok(None)
    }

    async fn get_job_run(&self, _run_id: &str) -> Result<Option<JobRunRow>, DataError> {
        Ok(None)
    }

    async fn list_operations(
        &self,
        _owner: OperationOwner,
    ) -> Result<Vec<OperationRow>, DataError> {
        Ok(Vec::new())
    }

    async fn count_requests(&self) -> Result<u64, DataError> {
        let persisted = self.persisted.lock();
        Ok(persisted
            .iter()
            .filter(|p| matches!(p, TrackingPayload::Request(_)))
            .count() as u64)
    }

    async fn count_job_runs(&self) -> Result<u64, DataError> {
        let persisted = self.persisted.lock();
        Ok(persisted
            .iter()
            .filter(|p| matches!(p, TrackingPayload::JobRun(_)))
            .count() as u64)
    }

    async fn ping(&self) -> Result<(), DataError> {
        if self.ping_fails.load(Ordering::SeqCst) {
            return Err(DataError::backend_unavailable("fake", "ping disabled"));
        }
        Ok(())
    }
}

/// Sink that keeps a rendering of every report
#[derive(Default)]
pub struct RecordingSink {
    reports: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn reports(&self) -> Vec<String> {
        self.reports.lock().clone()
    }
}

impl DiagnosticSink for RecordingSink {
    fn report(&self, failure: &PersistFailure) {
        self.reports.lock().push(format!(
            "{} {} attempts={} {}",
            failure.kind, failure.unique_id, failure.attempts, failure.error
        ));
    }
}
