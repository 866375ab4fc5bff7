//! TelemetryRepository trait implementation for SQLite
//!
//! Implements the trait for Arc<SqliteService> by delegating to the free
//! functions in `repositories`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::constants::HEALTH_CHECK_TIMEOUT_SECS;
use crate::data::error::DataError;
use crate::data::fingerprint::Fingerprint;
use crate::data::traits::TelemetryRepository;
use crate::data::types::{
    JobRunPayload, JobRunRow, MergeReport, OperationOwner, OperationRow, PersistOutcome,
    QueryRow, RequestPayload, RequestRow, RouteRow,
};
use crate::utils::time::now_millis;

use super::SqliteService;
use super::repositories::{job, maintenance, operation, persist, query, request, route};

#[async_trait]
impl TelemetryRepository for Arc<SqliteService> {
    // ==================== Persistence ====================

    async fn persist_request(&self, payload: &RequestPayload) -> Result<PersistOutcome, DataError> {
        persist::persist_request(self.pool(), payload)
            .await
            .map_err(Into::into)
    }

    async fn persist_job_run(&self, payload: &JobRunPayload) -> Result<PersistOutcome, DataError> {
        persist::persist_job_run(self.pool(), payload)
            .await
            .map_err(Into::into)
    }

    // ==================== Fingerprints ====================

    async fn resolve_query(&self, normalized_sql: &str) -> Result<QueryRow, DataError> {
        let mut conn = self.pool().acquire().await.map_err(DataError::Sqlite)?;
        query::resolve_query(&mut conn, &Fingerprint::of_normalized(normalized_sql), now_millis())
            .await
            .map_err(Into::into)
    }

    async fn merge_duplicate_queries(&self) -> Result<MergeReport, DataError> {
        maintenance::merge_duplicate_queries(self.pool())
            .await
            .map_err(Into::into)
    }

    // ==================== Reads ====================

    async fn find_route(&self, method: &str, path: &str) -> Result<Option<RouteRow>, DataError> {
        route::find_route(self.pool(), method, path)
            .await
            .map_err(Into::into)
    }

    async fn get_request(&self, request_uuid: &str) -> Result<Option<RequestRow>, DataError> {
        request::get_request(self.pool(), request_uuid)
            .await
            .map_err(Into::into)
    }

    async fn get_job_run(&self, run_id: &str) -> Result<Option<JobRunRow>, DataError> {
        job::get_job_run(self.pool(), run_id)
            .await
            .map_err(Into::into)
    }

    async fn list_operations(
        &self,
        owner: OperationOwner,
    ) -> Result<Vec<OperationRow>, DataError> {
        operation::list_operations(self.pool(), owner)
            .await
            .map_err(Into::into)
    }

    async fn count_requests(&self) -> Result<u64, DataError> {
        request::count_requests(self.pool())
            .await
            .map_err(Into::into)
    }

    async fn count_job_runs(&self) -> Result<u64, DataError> {
        job::count_job_runs(self.pool()).await.map_err(Into::into)
    }

    // ==================== Health ====================

    async fn ping(&self) -> Result<(), DataError> {
        let probe = sqlx::query("SELECT 1").execute(self.pool());
        match tokio::time::timeout(Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS), probe).await {
            Ok(result) => result.map(|_| ()).map_err(DataError::Sqlite),
            Err(_) => Err(DataError::timeout("sqlite", HEALTH_CHECK_TIMEOUT_SECS)),
        }
    }
}
