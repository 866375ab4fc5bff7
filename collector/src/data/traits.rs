//! Repository trait for telemetry storage backends
//!
//! Both SQLite and PostgreSQL implement [`TelemetryRepository`]; the tracker
//! and the API only ever see the trait object.

use async_trait::async_trait;

use crate::data::error::DataError;
use crate::data::types::{
    JobRunPayload, JobRunRow, MergeReport, OperationOwner, OperationRow, PersistOutcome,
    QueryRow, RequestPayload, RequestRow, RouteRow,
};

/// Storage operations needed by the capture-and-persist pipeline
#[async_trait]
pub trait TelemetryRepository: Send + Sync {
    // ==================== Persistence ====================

    /// Persist a captured request with its operations (idempotent on unique id)
    async fn persist_request(&self, payload: &RequestPayload) -> Result<PersistOutcome, DataError>;

    /// Persist a captured job run with its operations (idempotent on run id)
    async fn persist_job_run(&self, payload: &JobRunPayload) -> Result<PersistOutcome, DataError>;

    // ==================== Fingerprints ====================

    /// Resolve already-normalized SQL to its query row, creating it if absent
    async fn resolve_query(&self, normalized_sql: &str) -> Result<QueryRow, DataError>;

    /// Collapse query rows that share a normalized statement
    async fn merge_duplicate_queries(&self) -> Result<MergeReport, DataError>;

    // ==================== Reads ====================

    async fn find_route(&self, method: &str, path: &str) -> Result<Option<RouteRow>, DataError>;

    async fn get_request(&self, request_uuid: &str) -> Result<Option<RequestRow>, DataError>;

    async fn get_job_run(&self, run_id: &str) -> Result<Option<JobRunRow>, DataError>;

    /// Operations of one unit of work, in capture order
    async fn list_operations(&self, owner: OperationOwner)
    -> Result<Vec<OperationRow>, DataError>;

    async fn count_requests(&self) -> Result<u64, DataError>;

    async fn count_job_runs(&self) -> Result<u64, DataError>;

    // ==================== Health ====================

    /// Liveness probe (`SELECT 1`)
    async fn ping(&self) -> Result<(), DataError>;
}
